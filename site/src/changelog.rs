//! Release notes page

use crate::api::SiteApi;
use crate::error::FetchError;
use rbe_client::ChangelogEntry;

/// Release notes, newest first
///
/// Entries are ordered by date, then by version for releases on the same day.
///
/// # Errors
///
/// - [`FetchError::Unreachable`]: the API is down
/// - [`FetchError::NotFound`]: the API answered with a client error
pub async fn load_changelog(api: &dyn SiteApi) -> Result<Vec<ChangelogEntry>, FetchError> {
    let mut entries = api
        .changelog()
        .await
        .inspect_err(|error| tracing::warn!(%error, "Changelog unavailable"))?;

    entries.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| version_key(&b.version).cmp(&version_key(&a.version)))
    });
    Ok(entries)
}

/// Numeric components of `v1.2.10`, so that 1.2.10 sorts after 1.2.9
fn version_key(version: &str) -> Vec<u64> {
    version
        .trim_start_matches(['v', 'V'])
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::api::mock::MockSiteApi;

    fn entry(version: &str, date: &str) -> ChangelogEntry {
        ChangelogEntry {
            version: version.into(),
            title: format!("Version {version}"),
            date: date.into(),
            changes: vec!["Corrections".into()],
        }
    }

    #[tokio::test]
    async fn newest_first() {
        let api = MockSiteApi::new().with_changelog(vec![
            entry("1.2.9", "2025-03-01"),
            entry("1.3.0", "2025-04-12"),
            entry("1.2.10", "2025-03-01"),
        ]);

        let versions: Vec<String> = load_changelog(&api)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.version)
            .collect();
        assert_eq!(versions, vec!["1.3.0", "1.2.10", "1.2.9"]);
    }

    #[tokio::test]
    async fn unreachable_is_reported() {
        assert!(matches!(
            load_changelog(&MockSiteApi::new()).await,
            Err(FetchError::Unreachable(_))
        ));
    }
}
