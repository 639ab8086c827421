//! Resource link resolution

use url::Url;

use super::LinkBuilder;
use crate::error::AppError;

/// Resolves resource references against the installation URL
///
/// Absolute URLs pass through unchanged.
#[derive(Debug, Clone)]
pub struct BaseUrlLinkBuilder {
    base: Url,
}

impl BaseUrlLinkBuilder {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        // Url::join drops the last path segment unless it ends with '/'
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base = Url::parse(&normalized)
            .map_err(|e| AppError::Config(format!("invalid installation URL {base_url}: {e}")))?;
        Ok(Self { base })
    }
}

impl LinkBuilder for BaseUrlLinkBuilder {
    fn resource_url(&self, resource: &str) -> Result<Url, AppError> {
        if resource.trim().is_empty() {
            return Err(AppError::Validation("empty resource reference".to_string()));
        }
        if let Ok(absolute) = Url::parse(resource) {
            return Ok(absolute);
        }
        self.base
            .join(resource.trim_start_matches('/'))
            .map_err(|e| AppError::Validation(format!("invalid resource {resource}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_resources_resolve_below_installation_path() {
        let builder = BaseUrlLinkBuilder::new("https://example.com/ilias").unwrap();
        assert_eq!(
            builder.resource_url("/data/lm/lm_1.zip").unwrap().as_str(),
            "https://example.com/ilias/data/lm/lm_1.zip"
        );
    }

    #[test]
    fn absolute_resources_pass_through() {
        let builder = BaseUrlLinkBuilder::new("https://example.com/ilias/").unwrap();
        assert_eq!(
            builder
                .resource_url("https://cdn.example.com/lm_1.zip")
                .unwrap()
                .as_str(),
            "https://cdn.example.com/lm_1.zip"
        );
    }

    #[test]
    fn empty_resource_is_rejected() {
        let builder = BaseUrlLinkBuilder::new("https://example.com").unwrap();
        assert!(matches!(
            builder.resource_url(" "),
            Err(AppError::Validation(_))
        ));
    }
}
