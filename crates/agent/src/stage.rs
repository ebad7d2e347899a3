use std::fmt;

/// The fixed pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    SearchTerms,
    Retrieval,
    Summarize,
    Generate,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::SearchTerms,
        StageKind::Retrieval,
        StageKind::Summarize,
        StageKind::Generate,
    ];

    /// The only legal transition out of this stage.
    pub fn next(self) -> Option<StageKind> {
        match self {
            StageKind::SearchTerms => Some(StageKind::Retrieval),
            StageKind::Retrieval => Some(StageKind::Summarize),
            StageKind::Summarize => Some(StageKind::Generate),
            StageKind::Generate => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StageKind::SearchTerms => "search_terms",
            StageKind::Retrieval => "retrieval",
            StageKind::Summarize => "summarize",
            StageKind::Generate => "generate",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
