use std::fmt;

use serde::{Deserialize, Serialize};

/// The publication pipeline steps, declared in pipeline order.
///
/// `Ord` follows declaration order, so any ordered collection keyed by
/// `Step` iterates in execution order. Every request runs a subsequence of
/// this list; the URL and tar flows never include each other's checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    RetrieveResources,
    TokenChecker,
    UserChecker,
    Specberus,
    ThirdPartyChecker,
    Publish,
    TrInstall,
    UpdateTrShortlink,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::RetrieveResources,
        Step::TokenChecker,
        Step::UserChecker,
        Step::Specberus,
        Step::ThirdPartyChecker,
        Step::Publish,
        Step::TrInstall,
        Step::UpdateTrShortlink,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Step::RetrieveResources => "retrieve-resources",
            Step::TokenChecker => "token-checker",
            Step::UserChecker => "user-checker",
            Step::Specberus => "specberus",
            Step::ThirdPartyChecker => "third-party-checker",
            Step::Publish => "publish",
            Step::TrInstall => "tr-install",
            Step::UpdateTrShortlink => "update-tr-shortlink",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
