//! FEAT feature-set parsing and storage (RFC 2389)
//!
//! The FEAT command returns a multi-line reply listing the extensions the
//! server supports. Each feature line is conventionally indented by one
//! space and may carry arguments (e.g. `REST STREAM`, `MDTM`, `UTF8`).

use std::collections::HashMap;

/// The set of features a server advertised in its FEAT reply
#[must_use]
#[derive(Debug, Clone)]
pub struct Features {
    features: HashMap<String, Vec<String>>,
}

impl Features {
    /// Create an empty feature set (used before FEAT has been sent, or for
    /// servers that reject it outright)
    pub fn new() -> Self {
        Self {
            features: HashMap::new(),
        }
    }

    /// Parse feature lines from a FEAT reply's info text (the lines between
    /// the opening `211-Features:` and the closing `211 End`).
    ///
    /// # Format
    /// Each line is: `[ ]FEATURE [arg1 arg2 ...]`
    ///
    /// # Example
    /// ```text
    ///  EPSV
    ///  MDTM
    ///  REST STREAM
    ///  UTF8
    ///  PRET
    /// ```
    pub fn parse(lines: &[String]) -> Self {
        let mut features = HashMap::new();

        for line in lines {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }

            let feature = parts[0].to_uppercase();
            let args: Vec<String> = parts[1..].iter().map(|s| s.to_string()).collect();
            features.insert(feature, args);
        }

        Self { features }
    }

    /// Check if a feature is supported
    #[must_use]
    pub fn has(&self, feature: &str) -> bool {
        self.features.contains_key(&feature.to_uppercase())
    }

    /// Get arguments for a feature
    ///
    /// Returns `None` if the feature was not advertised
    #[must_use]
    pub fn get_args(&self, feature: &str) -> Option<&Vec<String>> {
        self.features.get(&feature.to_uppercase())
    }

    /// Get all feature names
    pub fn list(&self) -> Vec<String> {
        self.features.keys().cloned().collect()
    }

    /// Check if the server supports a specific feature with a specific argument
    ///
    /// # Example
    /// ```no_run
    /// # use ftp_rs::Features;
    /// # let features = Features::new();
    /// if features.has_arg("REST", "STREAM") {
    ///     println!("Server supports streaming REST");
    /// }
    /// ```
    pub fn has_arg(&self, feature: &str, arg: &str) -> bool {
        self.get_args(feature)
            .map(|args| args.iter().any(|a| a.eq_ignore_ascii_case(arg)))
            .unwrap_or(false)
    }
}

impl Default for Features {
    fn default() -> Self {
        Self::new()
    }
}
