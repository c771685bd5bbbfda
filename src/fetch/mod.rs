//! Result retrieval and fix-size metrics

use codefix_protocol::ops::SuggestedFix;
use codefix_protocol::Profile;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::FixError;
use crate::host::ServiceClient;

/// Fetch the fix of a succeeded job
///
/// A success without a fix, or with an empty diff, is a fetch failure.
pub async fn fetch_result(
    client: &ServiceClient,
    job_id: &str,
    profile: Option<&Profile>,
    token: &CancelToken,
) -> Result<SuggestedFix, FixError> {
    token.check()?;

    let fail = |reason: String| FixError::ResultFetchFailed {
        job_id: job_id.to_string(),
        reason,
    };

    let response = client
        .get_fix_result(job_id, profile)
        .await
        .map_err(|e| fail(e.to_string()))?;

    let fix = response
        .suggested_fix
        .ok_or_else(|| fail(format!("job reported {:?} without a fix", response.status)))?;

    if fix.code_diff.trim().is_empty() {
        return Err(fail("fix has an empty diff".to_string()));
    }

    Ok(fix)
}

/// Size of a suggested fix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixMetrics {
    pub lines_changed: u32,
    pub chars_changed: u32,
}

impl FixMetrics {
    /// Count added and removed lines of a unified diff
    ///
    /// File headers (`+++`/`---`) are skipped. Returns None when the text
    /// has no change lines at all.
    pub fn from_diff(diff: &str) -> Option<Self> {
        let mut metrics = FixMetrics::default();

        for line in diff.lines() {
            if line.starts_with("+++") || line.starts_with("---") {
                continue;
            }
            if let Some(content) = line.strip_prefix('+').or_else(|| line.strip_prefix('-')) {
                metrics.add_line(content);
            }
        }

        if metrics.lines_changed == 0 {
            None
        } else {
            Some(metrics)
        }
    }

    /// Counters saturate at `u32::MAX`
    fn add_line(&mut self, content: &str) {
        let chars = u32::try_from(content.chars().count()).unwrap_or(u32::MAX);
        self.lines_changed = self.lines_changed.saturating_add(1);
        self.chars_changed = self.chars_changed.saturating_add(chars);
    }
}
