const INDENT: &str = "  ";

/// Accumulates output lines, tracking indentation and blank lines between them.
///
/// Blank lines are requested with [`gap`](Writer::gap) and emitted lazily before the next line,
/// so consecutive requests collapse into one. A gap requested at the start of the output or
/// just inside an opened block is dropped, as is one pending before a closing brace.
#[derive(Debug)]
pub(super) struct Writer {
    out: String,
    depth: usize,
    pending_gap: bool,
    fresh: bool,
}

impl Writer {
    pub fn new() -> Self {
        Writer {
            out: String::new(),
            depth: 0,
            pending_gap: false,
            fresh: true,
        }
    }

    pub fn gap(&mut self) {
        self.pending_gap = true;
    }

    /// Writes `text` at the current indentation. Each line of a multi-line `text` is indented.
    pub fn line(&mut self, text: &str) {
        if self.pending_gap && !self.fresh {
            self.out.push('\n');
        }
        self.pending_gap = false;
        self.fresh = false;

        for line in text.split('\n') {
            if !line.is_empty() {
                for _ in 0..self.depth {
                    self.out.push_str(INDENT);
                }
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
    }

    /// Writes comment text as `//` lines. The text is stored without markers, with one
    /// trailing newline.
    pub fn comment(&mut self, text: &str) {
        for line in comment_lines(text) {
            let mut buf = String::with_capacity(line.len() + 2);
            buf.push_str("//");
            buf.push_str(line);
            self.line(&buf);
        }
    }

    pub fn open(&mut self, header: &str) {
        self.line(header);
        self.depth += 1;
        self.fresh = true;
    }

    pub fn close(&mut self, text: &str) {
        self.pending_gap = false;
        self.depth = self.depth.saturating_sub(1);
        self.fresh = false;
        self.line(text);
    }

    pub fn indented<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Splits comment text into lines, ignoring the final newline.
pub(super) fn comment_lines(text: &str) -> Vec<&str> {
    text.strip_suffix('\n').unwrap_or(text).split('\n').collect()
}

/// Appends the indentation for `depth` nesting levels, relative to the current line.
pub(super) fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}
