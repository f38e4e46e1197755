//! Validation helpers for DTOs.

use validator::{ValidateUrl, ValidationError};

/// Longest accepted game identifier.
pub const MAX_GAME_NAME_LEN: usize = 64;
/// Inclusive bounds on the player name length, counted in characters.
pub const PLAYER_NAME_LEN: (usize, usize) = (2, 20);

/// Validates that a game identifier is 1 to 64 ASCII letters, digits, `-` or `_`.
///
/// # Examples
///
/// ```ignore
/// validate_game_name("clicker")   // Ok
/// validate_game_name("")          // Err - empty
/// validate_game_name("space bar") // Err - whitespace
/// ```
pub fn validate_game_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.len() > MAX_GAME_NAME_LEN {
        let mut err = ValidationError::new("game_name_length");
        err.message = Some(
            format!("Game name must be 1-{MAX_GAME_NAME_LEN} characters (got {})", name.len())
                .into(),
        );
        return Err(err);
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("game_name_format");
        err.message =
            Some("Game name may only contain letters, digits, '-' and '_'".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a player name holds between 2 and 20 characters.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let (min, max) = PLAYER_NAME_LEN;
    let len = name.chars().count();
    if len < min || len > max {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(format!("Player name must be {min}-{max} characters").into());
        return Err(err);
    }
    Ok(())
}

/// Validates that an image reference parses as a URL (`https://` or `data:` alike).
pub fn validate_image_url(url: &str) -> Result<(), ValidationError> {
    if url.validate_url() {
        Ok(())
    } else {
        let mut err = ValidationError::new("image_url");
        err.message = Some("Image URL is not a valid URL".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_game_name_valid() {
        assert!(validate_game_name("clicker").is_ok());
        assert!(validate_game_name("reaction").is_ok());
        assert!(validate_game_name("snake_v2-hard").is_ok());
        assert!(validate_game_name(&"a".repeat(MAX_GAME_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_validate_game_name_invalid() {
        assert!(validate_game_name("").is_err());
        assert!(validate_game_name(&"a".repeat(MAX_GAME_NAME_LEN + 1)).is_err());
        assert!(validate_game_name("space bar").is_err());
        assert!(validate_game_name("../etc").is_err());
    }

    #[test]
    fn test_validate_player_name_bounds() {
        assert!(validate_player_name("A").is_err());
        assert!(validate_player_name("Al").is_ok());
        assert!(validate_player_name(&"x".repeat(20)).is_ok());
        assert!(validate_player_name(&"x".repeat(21)).is_err());
    }

    #[test]
    fn test_validate_player_name_counts_characters_not_bytes() {
        // Two characters, four bytes.
        assert!(validate_player_name("éé").is_ok());
        assert!(validate_player_name(&"é".repeat(20)).is_ok());
    }

    #[test]
    fn test_validate_image_url() {
        assert!(validate_image_url("https://example.com/cat.png").is_ok());
        assert!(validate_image_url("data:image/png;base64,iVBORw0KGgo=").is_ok());
        assert!(validate_image_url("not a url").is_err());
    }
}
