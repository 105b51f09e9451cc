//! Supported-currency registry.
//!
//! The set of currencies the storefront prices in is closed: it is fixed at
//! startup and every [`CurrencyCode`] in circulation comes out of a
//! [`CurrencyRegistry`] lookup (or the built-in [`catalog`]). Unknown codes are
//! rejected instead of being passed through.

use serde::Serialize;
use std::fmt;

use crate::error::{CurrencyError, Result};

/// ISO 4217 style code of a supported currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Validate the shape of a code. Registry membership is checked elsewhere.
    pub(crate) fn parse(raw: &str) -> Result<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(CurrencyError::InvalidCode(raw.to_string()));
        }
        Ok(Self(code))
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Display metadata for a supported currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyInfo {
    code: CurrencyCode,
    name: String,
    symbol: String,
    flag: String,
    is_default: bool,
}

impl CurrencyInfo {
    /// Create currency metadata. The code must be three ASCII letters.
    pub fn new(
        code: &str,
        name: impl Into<String>,
        symbol: impl Into<String>,
        flag: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            code: CurrencyCode::parse(code)?,
            name: name.into(),
            symbol: symbol.into(),
            flag: flag.into(),
            is_default: false,
        })
    }

    /// Mark this currency as the registry default.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Currency code.
    pub fn code(&self) -> &CurrencyCode {
        &self.code
    }

    /// Display name, e.g. `Franc CFA`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display symbol, e.g. `FCFA`.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Flag glyph shown next to the currency.
    pub fn flag(&self) -> &str {
        &self.flag
    }

    /// Check if this is the registry default.
    pub fn is_default(&self) -> bool {
        self.is_default
    }
}

/// Metadata for every currency the storefront knows how to display.
///
/// XOF is the default. Deployments select a subset through
/// [`CurrencyRegistry::from_catalog`].
pub fn catalog() -> Vec<CurrencyInfo> {
    vec![
        known("XOF", "Franc CFA", "FCFA", "🇹🇬", true),
        known("USD", "Dollar américain", "$", "🇺🇸", false),
        known("EUR", "Euro", "€", "🇪🇺", false),
    ]
}

fn known(code: &str, name: &str, symbol: &str, flag: &str, is_default: bool) -> CurrencyInfo {
    CurrencyInfo {
        code: CurrencyCode(code.to_string()),
        name: name.to_string(),
        symbol: symbol.to_string(),
        flag: flag.to_string(),
        is_default,
    }
}

/// Closed set of supported currencies, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyRegistry {
    currencies: Vec<CurrencyInfo>,
}

impl CurrencyRegistry {
    /// Build a registry, checking that codes are unique and exactly one
    /// currency is the default.
    pub fn new(currencies: Vec<CurrencyInfo>) -> Result<Self> {
        if currencies.is_empty() {
            return Err(CurrencyError::InvalidRegistry(
                "at least one currency is required".to_string(),
            ));
        }

        for (idx, info) in currencies.iter().enumerate() {
            if currencies[..idx].iter().any(|other| other.code == info.code) {
                return Err(CurrencyError::InvalidRegistry(format!(
                    "duplicate currency {}",
                    info.code
                )));
            }
        }

        let defaults = currencies.iter().filter(|c| c.is_default).count();
        if defaults != 1 {
            return Err(CurrencyError::InvalidRegistry(format!(
                "exactly one default currency required, found {}",
                defaults
            )));
        }

        Ok(Self { currencies })
    }

    /// The reference deployment: every catalog currency, XOF as default.
    pub fn reference() -> Self {
        Self {
            currencies: catalog(),
        }
    }

    /// Select `codes` from the [`catalog`] and make `default` the default.
    pub fn from_catalog<S: AsRef<str>>(codes: &[S], default: &str) -> Result<Self> {
        let default = CurrencyCode::parse(default)?;
        let catalog = catalog();

        let mut currencies = Vec::with_capacity(codes.len());
        for raw in codes {
            let code = CurrencyCode::parse(raw.as_ref())?;
            let mut info = catalog
                .iter()
                .find(|info| info.code == code)
                .cloned()
                .ok_or_else(|| CurrencyError::Unsupported(code.to_string()))?;
            info.is_default = info.code == default;
            currencies.push(info);
        }

        if !currencies.iter().any(|info| info.code == default) {
            return Err(CurrencyError::InvalidRegistry(format!(
                "default currency {} is not in the supported set",
                default
            )));
        }

        Self::new(currencies)
    }

    /// Resolve a raw code to a supported [`CurrencyCode`].
    pub fn code(&self, raw: &str) -> Result<CurrencyCode> {
        let code = CurrencyCode::parse(raw)
            .map_err(|_| CurrencyError::Unsupported(raw.to_string()))?;
        if self.contains(&code) {
            Ok(code)
        } else {
            Err(CurrencyError::Unsupported(code.0))
        }
    }

    /// Resolve a per-request preference, falling back to the default when
    /// no preference is set. An unknown preference is an error.
    pub fn preferred_or_default(&self, preferred: Option<&str>) -> Result<CurrencyCode> {
        match preferred {
            Some(raw) => self.code(raw),
            None => Ok(self.default_code().clone()),
        }
    }

    /// Metadata for `code`.
    pub fn get(&self, code: &CurrencyCode) -> Option<&CurrencyInfo> {
        self.currencies.iter().find(|info| &info.code == code)
    }

    /// Check if `code` is supported.
    pub fn contains(&self, code: &CurrencyCode) -> bool {
        self.get(code).is_some()
    }

    /// Symbol for `code`, or the code itself when it is not registered.
    pub fn symbol<'a>(&'a self, code: &'a CurrencyCode) -> &'a str {
        self.get(code).map(|info| info.symbol()).unwrap_or(code.as_str())
    }

    /// Metadata of the default currency.
    pub fn default_info(&self) -> &CurrencyInfo {
        // `new` guarantees exactly one default.
        self.currencies
            .iter()
            .find(|info| info.is_default)
            .unwrap_or(&self.currencies[0])
    }

    /// Code of the default currency.
    pub fn default_code(&self) -> &CurrencyCode {
        &self.default_info().code
    }

    /// Supported currencies in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &CurrencyInfo> {
        self.currencies.iter()
    }

    /// Supported codes in registry order.
    pub fn codes(&self) -> impl Iterator<Item = &CurrencyCode> {
        self.currencies.iter().map(|info| &info.code)
    }

    /// Number of supported currencies.
    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }
}

impl Default for CurrencyRegistry {
    fn default() -> Self {
        Self::reference()
    }
}
