/// The delimiter character family of a code fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceMarker {
    Backticks,
    Tildes,
}

impl FenceMarker {
    pub fn ch(self) -> char {
        match self {
            FenceMarker::Backticks => '`',
            FenceMarker::Tildes => '~',
        }
    }
}

/// An opening fence: marker character and the literal run length.
///
/// The run length matters because a fence is only closed by a line made of
/// the same character repeated exactly as many times — a 4-backtick fence
/// can contain a literal 3-backtick line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence {
    pub marker: FenceMarker,
    pub len: usize,
}

impl Fence {
    /// Try to read an opening fence from a line. Returns the fence and the
    /// attribute text following the marker run.
    pub fn open(line: &str) -> Option<(Fence, &str)> {
        let stripped = line.trim_start();
        let marker = if stripped.starts_with("```") {
            FenceMarker::Backticks
        } else if stripped.starts_with("~~~") {
            FenceMarker::Tildes
        } else {
            return None;
        };
        let len = stripped.chars().take_while(|&c| c == marker.ch()).count();
        let attr = stripped[len..].trim();
        Some((Fence { marker, len }, attr))
    }

    /// Whether a line closes this fence: the line must consist of exactly
    /// the opening marker run, nothing else.
    pub fn closes(&self, line: &str) -> bool {
        let line = line.trim_end_matches('\r');
        line.len() == self.len && line.chars().all(|c| c == self.marker.ch())
    }
}
