//! Request shapes accepted at intake and the step list each one runs.

use std::fmt;
use std::path::PathBuf;

use crate::state_machine::Step;

/// Where the document comes from and who vouches for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Document fetched from a URL, authorized by a token.
    Url { url: String, token: Option<String> },
    /// Document uploaded as a tar archive by an authenticated user.
    Tar {
        archive: PathBuf,
        user: Option<String>,
    },
}

/// A publication request as decided at intake. Never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationRequest {
    pub kind: RequestKind,
    /// Stop after the checks; nothing is published or installed.
    pub dry_run: bool,
}

impl PublicationRequest {
    pub fn url(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            kind: RequestKind::Url {
                url: url.into(),
                token,
            },
            dry_run: false,
        }
    }

    pub fn tar(archive: impl Into<PathBuf>, user: Option<String>) -> Self {
        Self {
            kind: RequestKind::Tar {
                archive: archive.into(),
                user,
            },
            dry_run: false,
        }
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The ordered steps this request runs.
    pub fn steps(&self) -> Vec<Step> {
        let checker = match self.kind {
            RequestKind::Url { .. } => Step::TokenChecker,
            RequestKind::Tar { .. } => Step::UserChecker,
        };
        let mut steps = vec![
            Step::RetrieveResources,
            checker,
            Step::Specberus,
            Step::ThirdPartyChecker,
        ];
        if !self.dry_run {
            steps.extend([Step::Publish, Step::TrInstall, Step::UpdateTrShortlink]);
        }
        steps
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Url { url, .. } => write!(f, "{url}"),
            RequestKind::Tar { archive, .. } => write!(f, "{}", archive.display()),
        }
    }
}
