use anyhow::{Result, anyhow};

use crate::faucet::Identity;

pub const MAX_IDENTITY_LEN: usize = 128;

/// Address shape accepted by the faucet: bech32 prefix plus a fixed length.
#[derive(Debug, Clone)]
pub struct AddressRules {
    pub hrp: String,
    pub length: usize,
}

impl AddressRules {
    pub fn new(hrp: impl Into<String>, length: usize) -> Self {
        let hrp = hrp.into().to_ascii_lowercase();
        assert!(!hrp.is_empty(), "Bech32 prefix must not be empty");
        assert!(length > hrp.len(), "Address length must exceed the prefix");
        Self { hrp, length }
    }

    /// Strips whitespace and lower-cases before checking prefix and length.
    pub fn sanitize(&self, value: &str) -> Result<String> {
        let normalized: String = value
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(anyhow!("Wallet address cannot be empty"));
        }
        if !normalized.starts_with(&self.hrp) {
            return Err(anyhow!("Wallet address must start with {}", self.hrp));
        }
        if normalized.len() != self.length {
            return Err(anyhow!(
                "Wallet address must be {} characters, got {}",
                self.length,
                normalized.len()
            ));
        }
        if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(anyhow!("Wallet address contains invalid characters"));
        }
        Ok(normalized)
    }
}

pub fn sanitize_identity(value: &str) -> Result<Identity> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Identity cannot be empty"));
    }
    if trimmed.len() > MAX_IDENTITY_LEN {
        return Err(anyhow!(
            "Identity exceeds {MAX_IDENTITY_LEN} character limit"
        ));
    }
    Ok(Identity::new(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> AddressRules {
        AddressRules::new("cosmos", 44)
    }

    #[test]
    fn address_is_normalized() {
        let raw = " COSMOS1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7x ";
        let sanitized = rules().sanitize(raw).expect("valid address");
        assert_eq!(sanitized, "cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7x");
        assert_eq!(sanitized.len(), 44);
    }

    #[test]
    fn address_validation() {
        assert!(rules().sanitize("").is_err());
        assert!(rules().sanitize("osmo1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xyz").is_err());
        assert!(rules().sanitize("cosmos1short").is_err());
        assert!(rules().sanitize("cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7!").is_err());
    }

    #[test]
    fn identity_validation() {
        assert_eq!(sanitize_identity(" 42 ").unwrap(), Identity::new("42"));
        assert!(sanitize_identity("   ").is_err());
        assert!(sanitize_identity(&"x".repeat(MAX_IDENTITY_LEN + 1)).is_err());
    }
}
