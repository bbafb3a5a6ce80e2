//! Pre-registered namespace prefixes.

/// Synthetic URI prefix used for every supported markup prefix.
///
/// The URIs never leave the process; they only give the parser and XPath
/// engine something to bind the prefixes to.
pub const URN_PREFIX: &str = "urn:confluence-prefix:";

/// Tag of the synthetic wrapper element.
pub const WRAPPER_TAG: &str = "xml";

/// Prefixes Confluence uses in storage markup.
const SUPPORTED_PREFIXES: &[&str] = &["ac", "ri"];

/// Prefix to namespace URI bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    bindings: Vec<(String, String)>,
}

impl Namespaces {
    /// Bindings for the Confluence storage prefixes.
    #[must_use]
    pub fn confluence() -> Self {
        Self {
            bindings: SUPPORTED_PREFIXES
                .iter()
                .map(|prefix| ((*prefix).to_owned(), format!("{URN_PREFIX}{prefix}")))
                .collect(),
        }
    }

    /// Add or replace a binding.
    #[must_use]
    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let uri = uri.into();
        match self.bindings.iter_mut().find(|(p, _)| *p == prefix) {
            Some(binding) => binding.1 = uri,
            None => self.bindings.push((prefix, uri)),
        }
        self
    }

    /// Namespace URI bound to `prefix`.
    #[must_use]
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// `xmlns:` declarations for every binding, space separated.
    #[must_use]
    pub fn declarations(&self) -> String {
        self.bindings
            .iter()
            .map(|(prefix, uri)| format!(r#"xmlns:{prefix}="{uri}""#))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Opening tag of the synthetic wrapper.
    pub(crate) fn wrapper_open(&self) -> String {
        format!("<{WRAPPER_TAG} {}>", self.declarations())
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::confluence()
    }
}

/// Split a qualified name into prefix and local part.
pub(crate) fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Whether an attribute name declares a namespace.
pub(crate) fn is_declaration(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confluence_bindings() {
        let ns = Namespaces::confluence();
        assert_eq!(ns.resolve("ac"), Some("urn:confluence-prefix:ac"));
        assert_eq!(ns.resolve("ri"), Some("urn:confluence-prefix:ri"));
        assert_eq!(ns.resolve("x"), None);
    }

    #[test]
    fn test_declarations() {
        assert_eq!(
            Namespaces::confluence().declarations(),
            r#"xmlns:ac="urn:confluence-prefix:ac" xmlns:ri="urn:confluence-prefix:ri""#
        );
    }

    #[test]
    fn test_with_replaces_existing_binding() {
        let ns = Namespaces::confluence().with("ac", "urn:other");
        assert_eq!(ns.resolve("ac"), Some("urn:other"));
    }

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("ac:link"), (Some("ac"), "link"));
        assert_eq!(split_qname("p"), (None, "p"));
    }
}
