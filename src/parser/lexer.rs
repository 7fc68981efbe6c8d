//! Tolerant line tokenizer for shell scripts.
//!
//! This is not a shell grammar. It tracks just enough state (quotes,
//! command substitutions, parameter and arithmetic expansions, heredocs,
//! `[[ ]]` tests, case patterns) to answer three questions per line:
//! which words sit in command position, which variables are expanded, and
//! where reserved `{` / `}` group delimiters occur. State carries across
//! lines so multi-line strings and heredoc bodies are skipped correctly.

/// Something the tokenizer saw on a line, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A word in command position.
    Command(Command),
    /// A word in command position that turned out to be a case pattern.
    CasePattern(String),
    /// Reserved word `{`.
    Open,
    /// Reserved word `}`.
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    /// The word contained only literal characters (no quotes, no expansions).
    pub plain: bool,
    /// Raw text of the first argument, quotes kept.
    pub first_arg: Option<String>,
}

/// Result of scanning one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineScan {
    pub events: Vec<Event>,
    /// Plain identifier-like words in argument position.
    pub args: Vec<String>,
    /// Expanded variable names.
    pub vars: Vec<String>,
    /// A command word was built from an expansion, or `eval` was used.
    pub dynamic: bool,
    /// The line belongs to a heredoc body (or is its delimiter).
    pub heredoc_body: bool,
}

impl LineScan {
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.events.iter().filter_map(|e| match e {
            Event::Command(c) => Some(c),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Top,
    Subst,
    Backtick,
    Single,
    Double,
    Param,
    Arith,
    Array,
}

impl Kind {
    fn is_code(self) -> bool {
        matches!(self, Kind::Top | Kind::Subst | Kind::Backtick)
    }
}

#[derive(Debug, Clone)]
struct WordBuf {
    /// Char index where the word started on the current line.
    start: usize,
    /// Text from earlier lines when the word spans a newline.
    prefix: String,
    /// Literal characters only.
    text: String,
    plain: bool,
    command: bool,
    dynamic: bool,
}

#[derive(Debug, Clone)]
struct Frame {
    kind: Kind,
    /// Parens for code/arith frames, braces for parameter expansions.
    depth: u32,
    command_pos: bool,
    in_test: bool,
    redirect: bool,
    skip_next: bool,
    word: Option<WordBuf>,
    /// Event index of the last command still waiting for its first argument.
    awaiting_arg: Option<usize>,
    /// Command events since the last `;`, `&` or newline.
    segment: Vec<usize>,
}

impl Frame {
    fn new(kind: Kind, command_pos: bool) -> Self {
        Self {
            kind,
            depth: 0,
            command_pos,
            in_test: false,
            redirect: false,
            skip_next: false,
            word: None,
            awaiting_arg: None,
            segment: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct Heredoc {
    delimiter: String,
    strip_tabs: bool,
    expand: bool,
}

/// Stateful tokenizer; feed it the lines of one file in order.
#[derive(Debug, Clone)]
pub struct Lexer {
    frames: Vec<Frame>,
    heredoc: Option<Heredoc>,
    pending: Vec<Heredoc>,
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexer {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(Kind::Top, true)],
            heredoc: None,
            pending: Vec::new(),
        }
    }

    /// True when the next line starts outside any string, substitution or
    /// heredoc body.
    pub fn at_top(&self) -> bool {
        self.frames.len() == 1 && self.heredoc.is_none()
    }

    /// Scan one line (without its terminator).
    pub fn scan_line(&mut self, line: &str) -> LineScan {
        let mut out = LineScan::default();
        let line = line.trim_end_matches('\r');

        if let Some(doc) = self.heredoc.clone() {
            out.heredoc_body = true;
            let candidate = if doc.strip_tabs {
                line.trim_start_matches('\t')
            } else {
                line
            };
            if candidate == doc.delimiter {
                self.heredoc = if self.pending.is_empty() {
                    None
                } else {
                    Some(self.pending.remove(0))
                };
            } else if doc.expand {
                out.vars.extend(expansions_in(line));
            }
            return out;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        let mut continued = false;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            match self.top().kind {
                Kind::Single => {
                    if c == '\'' {
                        self.pop();
                    }
                    i += 1;
                }
                Kind::Double => match c {
                    '\\' => i += 2,
                    '"' => {
                        self.pop();
                        i += 1;
                    }
                    '`' => {
                        self.frames.push(Frame::new(Kind::Backtick, true));
                        i += 1;
                    }
                    '$' => i = self.dollar(&chars, i, &mut out),
                    _ => i += 1,
                },
                Kind::Param | Kind::Array => match c {
                    '\\' => i += 2,
                    '\'' => {
                        self.frames.push(Frame::new(Kind::Single, false));
                        i += 1;
                    }
                    '"' => {
                        self.frames.push(Frame::new(Kind::Double, false));
                        i += 1;
                    }
                    '$' => i = self.dollar(&chars, i, &mut out),
                    '{' if self.top().kind == Kind::Param => {
                        self.top_mut().depth += 1;
                        i += 1;
                    }
                    '}' if self.top().kind == Kind::Param => {
                        self.close_nested();
                        i += 1;
                    }
                    ')' if self.top().kind == Kind::Array => {
                        self.pop();
                        i += 1;
                    }
                    _ => i += 1,
                },
                Kind::Arith => match c {
                    '(' => {
                        self.top_mut().depth += 1;
                        i += 1;
                    }
                    ')' => {
                        if self.top().depth == 0 {
                            self.pop();
                            i += if next == Some(')') { 2 } else { 1 };
                        } else {
                            self.top_mut().depth -= 1;
                            i += 1;
                        }
                    }
                    '$' => i = self.dollar(&chars, i, &mut out),
                    _ => i += 1,
                },
                Kind::Top | Kind::Subst | Kind::Backtick => {
                    i = self.code_char(&chars, i, &mut out, &mut continued);
                }
            }
        }

        self.end_of_line(&chars, continued, &mut out);
        out
    }

    fn top(&self) -> &Frame {
        // The top-level frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn close_nested(&mut self) {
        if self.top().depth == 0 {
            self.pop();
        } else {
            self.top_mut().depth -= 1;
        }
    }

    fn ensure_word(&mut self, at: usize) -> &mut WordBuf {
        let frame = self.top_mut();
        let command = frame.command_pos && !frame.redirect && !frame.skip_next;
        frame.word.get_or_insert_with(|| WordBuf {
            start: at,
            prefix: String::new(),
            text: String::new(),
            plain: true,
            command,
            dynamic: false,
        })
    }

    /// Handle one character in a code frame; returns the next index.
    fn code_char(
        &mut self,
        chars: &[char],
        i: usize,
        out: &mut LineScan,
        continued: &mut bool,
    ) -> usize {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let kind = self.top().kind;

        match c {
            ' ' | '\t' => {
                self.finish_word(chars, i, out);
                i + 1
            }
            '#' if self.top().word.is_none() => chars.len(),
            '\\' => match next {
                None => {
                    self.finish_word(chars, i, out);
                    *continued = true;
                    i + 1
                }
                Some(escaped) => {
                    let word = self.ensure_word(i);
                    word.text.push(escaped);
                    word.plain = false;
                    i + 2
                }
            },
            '\'' => {
                self.ensure_word(i).plain = false;
                self.frames.push(Frame::new(Kind::Single, false));
                i + 1
            }
            '"' => {
                self.ensure_word(i).plain = false;
                self.frames.push(Frame::new(Kind::Double, false));
                i + 1
            }
            '`' => {
                if kind == Kind::Backtick {
                    self.finish_word(chars, i, out);
                    self.pop();
                } else {
                    let word = self.ensure_word(i);
                    if word.text.is_empty() && word.command {
                        word.dynamic = true;
                    }
                    word.plain = false;
                    self.frames.push(Frame::new(Kind::Backtick, true));
                }
                i + 1
            }
            '$' => {
                let word = self.ensure_word(i);
                if word.text.is_empty() && word.command && word.plain {
                    word.dynamic = true;
                }
                word.plain = false;
                self.dollar(chars, i, out)
            }
            '(' => {
                let array_assignment = self
                    .top()
                    .word
                    .as_ref()
                    .is_some_and(|w| w.text.ends_with('='));
                if array_assignment {
                    self.frames.push(Frame::new(Kind::Array, false));
                    return i + 1;
                }
                if next == Some('(') && self.top().word.is_none() {
                    self.frames.push(Frame::new(Kind::Arith, false));
                    return i + 2;
                }
                self.finish_word(chars, i, out);
                let frame = self.top_mut();
                frame.depth += 1;
                frame.command_pos = true;
                i + 1
            }
            ')' => {
                self.finish_word(chars, i, out);
                if self.top().depth > 0 {
                    let frame = self.top_mut();
                    frame.depth -= 1;
                    frame.command_pos = true;
                } else if kind == Kind::Subst {
                    self.pop();
                } else {
                    // Unbalanced `)` at the top: the words before it were a
                    // case pattern, not commands.
                    let frame = self.top_mut();
                    for idx in frame.segment.drain(..) {
                        if let Some(Event::Command(cmd)) = out.events.get(idx) {
                            let name = cmd.name.clone();
                            out.events[idx] = Event::CasePattern(name);
                        }
                    }
                    frame.awaiting_arg = None;
                    frame.command_pos = true;
                }
                i + 1
            }
            ';' | '&' | '|' => {
                self.finish_word(chars, i, out);
                if c == '&' && next == Some('>') {
                    self.top_mut().redirect = true;
                    let mut j = i + 2;
                    if chars.get(j) == Some(&'>') {
                        j += 1;
                    }
                    return j;
                }
                let doubled = next == Some(c) || (c == '|' && next == Some('&'));
                let frame = self.top_mut();
                if c == ';' || !frame.in_test {
                    frame.command_pos = true;
                }
                if c == ';' || (c == '&' && !doubled) {
                    frame.segment.clear();
                }
                frame.awaiting_arg = None;
                if doubled {
                    i + 2
                } else {
                    i + 1
                }
            }
            '<' | '>' => {
                self.finish_word(chars, i, out);
                if next == Some('(') {
                    self.frames.push(Frame::new(Kind::Subst, true));
                    return i + 2;
                }
                if c == '<' && next == Some('<') {
                    if chars.get(i + 2) == Some(&'<') {
                        self.top_mut().redirect = true;
                        return i + 3;
                    }
                    return self.heredoc_operator(chars, i + 2);
                }
                self.top_mut().redirect = true;
                let mut j = i + 1;
                while matches!(chars.get(j), Some('>') | Some('&') | Some('|')) {
                    j += 1;
                }
                j
            }
            _ => {
                self.ensure_word(i).text.push(c);
                i + 1
            }
        }
    }

    /// Parse `<<[-] DELIM` starting just after `<<`; returns the next index.
    fn heredoc_operator(&mut self, chars: &[char], mut j: usize) -> usize {
        let mut strip_tabs = false;
        if chars.get(j) == Some(&'-') {
            strip_tabs = true;
            j += 1;
        }
        while matches!(chars.get(j), Some(' ') | Some('\t')) {
            j += 1;
        }
        let mut delimiter = String::new();
        let mut quoted = false;
        while let Some(&ch) = chars.get(j) {
            match ch {
                '\'' | '"' => {
                    quoted = true;
                    j += 1;
                    while let Some(&inner) = chars.get(j) {
                        j += 1;
                        if inner == ch {
                            break;
                        }
                        delimiter.push(inner);
                    }
                }
                '\\' => {
                    quoted = true;
                    j += 1;
                }
                ' ' | '\t' | ';' | '&' | '|' | '<' | '>' | '(' | ')' => break,
                _ => {
                    delimiter.push(ch);
                    j += 1;
                }
            }
        }
        if !delimiter.is_empty() {
            self.pending.push(Heredoc {
                delimiter,
                strip_tabs,
                expand: !quoted,
            });
        }
        j
    }

    /// Handle `$` at `i` in any frame; returns the next index.
    fn dollar(&mut self, chars: &[char], i: usize, out: &mut LineScan) -> usize {
        match chars.get(i + 1).copied() {
            Some('(') => {
                if chars.get(i + 2) == Some(&'(') {
                    self.frames.push(Frame::new(Kind::Arith, false));
                    i + 3
                } else {
                    self.frames.push(Frame::new(Kind::Subst, true));
                    i + 2
                }
            }
            Some('{') => {
                self.frames.push(Frame::new(Kind::Param, false));
                let mut j = i + 2;
                if matches!(chars.get(j), Some('!') | Some('#')) {
                    j += 1;
                }
                let (name, end) = read_identifier(chars, j);
                if !name.is_empty() {
                    out.vars.push(name);
                }
                end
            }
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                let (name, end) = read_identifier(chars, i + 1);
                out.vars.push(name);
                end
            }
            Some(ch) if ch.is_ascii_digit() || "@*#?$!-".contains(ch) => i + 2,
            _ => i + 1,
        }
    }

    fn finish_word(&mut self, chars: &[char], end: usize, out: &mut LineScan) {
        let frame = self.top_mut();
        let Some(word) = frame.word.take() else {
            return;
        };
        let mut raw = word.prefix;
        raw.extend(chars[word.start.min(end)..end].iter());

        if frame.redirect {
            frame.redirect = false;
            return;
        }
        if frame.skip_next {
            // Function name after `function`; its body opener follows.
            frame.skip_next = false;
            frame.command_pos = true;
            return;
        }
        if frame.in_test && word.text == "]]" {
            frame.in_test = false;
            frame.command_pos = false;
            return;
        }

        if !word.command {
            if let Some(idx) = frame.awaiting_arg.take() {
                if let Some(Event::Command(cmd)) = out.events.get_mut(idx) {
                    cmd.first_arg = Some(raw);
                }
            }
            if word.plain && is_identifier(&word.text) {
                out.args.push(word.text);
            }
            return;
        }

        if is_assignment(&word.text) {
            // `NAME=value cmd`: still in command position.
            return;
        }
        if word.plain {
            match word.text.as_str() {
                "{" => {
                    out.events.push(Event::Open);
                    frame.command_pos = true;
                    return;
                }
                "}" => {
                    out.events.push(Event::Close);
                    frame.command_pos = false;
                    return;
                }
                "[[" => {
                    frame.in_test = true;
                    frame.command_pos = false;
                    return;
                }
                "function" => {
                    frame.skip_next = true;
                    frame.command_pos = false;
                    return;
                }
                text => {
                    if let Some(command_pos) = keyword_effect(text) {
                        frame.command_pos = command_pos;
                        return;
                    }
                }
            }
        }
        frame.command_pos = false;
        let expanded = !word.plain && (raw.contains('$') || raw.contains('`'));
        let dynamic = word.dynamic || (expanded && !is_identifier(&word.text));
        if dynamic || word.text == "eval" {
            out.dynamic = true;
        }
        if dynamic || word.text.is_empty() {
            return;
        }
        out.events.push(Event::Command(Command {
            name: word.text,
            plain: word.plain,
            first_arg: None,
        }));
        let idx = out.events.len() - 1;
        frame.segment.push(idx);
        frame.awaiting_arg = Some(idx);
    }

    fn end_of_line(&mut self, chars: &[char], continued: bool, out: &mut LineScan) {
        if self.top().kind.is_code() {
            self.finish_word(chars, chars.len(), out);
            if !continued {
                let frame = self.top_mut();
                frame.command_pos = true;
                frame.redirect = false;
            }
        }
        // Event indices are per line. Words still open (multi-line strings)
        // keep their text so far.
        for frame in &mut self.frames {
            frame.segment.clear();
            frame.awaiting_arg = None;
            if let Some(word) = frame.word.as_mut() {
                let start = word.start.min(chars.len());
                word.prefix.extend(chars[start..].iter());
                word.prefix.push('\n');
                word.start = 0;
            }
        }
        if self.heredoc.is_none() && !self.pending.is_empty() {
            self.heredoc = Some(self.pending.remove(0));
        }
    }
}

/// Command position after a reserved word, or `None` for ordinary words.
fn keyword_effect(word: &str) -> Option<bool> {
    match word {
        "if" | "then" | "else" | "elif" | "do" | "while" | "until" | "!" | "time" | "coproc" => {
            Some(true)
        }
        "fi" | "done" | "esac" | "for" | "select" | "case" | "in" => Some(false),
        _ => None,
    }
}

fn read_identifier(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    let mut name = String::new();
    while let Some(&ch) = chars.get(end) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            name.push(ch);
            end += 1;
        } else {
            break;
        }
    }
    (name, end)
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `NAME=`, `NAME+=`, `NAME[idx]=` prefixes.
fn is_assignment(word: &str) -> bool {
    let Some(eq) = word.find('=') else {
        return false;
    };
    let lhs = word[..eq].trim_end_matches('+');
    let name = match lhs.find('[') {
        Some(bracket) if lhs.ends_with(']') => &lhs[..bracket],
        Some(_) => return false,
        None => lhs,
    };
    is_identifier(name)
}

/// Variable names expanded in a heredoc body line.
fn expansions_in(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut names = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == '$' {
            let start = if chars.get(i + 1) == Some(&'{') {
                i + 2
            } else {
                i + 1
            };
            let (name, end) = read_identifier(&chars, start);
            if !name.is_empty() && !name.starts_with(|c: char| c.is_ascii_digit()) {
                names.push(name);
                i = end;
                continue;
            }
        }
        i += 1;
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(lines: &[&str]) -> Vec<String> {
        let mut lexer = Lexer::new();
        lines
            .iter()
            .flat_map(|l| {
                lexer
                    .scan_line(l)
                    .commands()
                    .map(|c| c.name.clone())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(
            commands(&["helper arg1 arg2", "other; third | grep x && fourth"]),
            vec!["helper", "other", "third", "grep", "fourth"]
        );
    }

    #[test]
    fn test_comments_and_quotes_are_not_commands() {
        assert_eq!(
            commands(&[
                "# helper in a comment",
                "echo 'helper in single quotes'",
                "echo \"helper; other\"",
                "echo done # trailing comment helper",
            ]),
            vec!["echo", "echo", "echo"]
        );
    }

    #[test]
    fn test_command_substitution_inside_double_quotes() {
        assert_eq!(
            commands(&["result=\"$(helper --flag)\"", "value=`legacy_call`"]),
            vec!["helper", "legacy_call"]
        );
    }

    #[test]
    fn test_assignment_prefix_keeps_command_position() {
        assert_eq!(commands(&["LANG=C sort file"]), vec!["sort"]);
        assert!(commands(&["NAME=value"]).is_empty());
        assert!(commands(&["arr=(one two three)"]).is_empty());
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            commands(&[
                "if check_ready; then",
                "  run_job",
                "elif ! fallback; then",
                "  :",
                "fi",
                "while read -r line; do process \"$line\"; done < input",
            ]),
            vec!["check_ready", "run_job", "fallback", ":", "read", "process"]
        );
    }

    #[test]
    fn test_for_loop_words_are_arguments() {
        let mut lexer = Lexer::new();
        let scan = lexer.scan_line("for item in alpha beta; do handle \"$item\"; done");
        let names: Vec<_> = scan.commands().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["handle"]);
        assert!(scan.args.contains(&"alpha".to_string()));
        assert!(scan.vars.contains(&"item".to_string()));
    }

    #[test]
    fn test_arithmetic_is_skipped() {
        assert_eq!(
            commands(&["for ((i = 0; i < 3; i++)); do step; done", "(( count++ ))", "x=$((a + b))"]),
            vec!["step"]
        );
    }

    #[test]
    fn test_test_brackets() {
        assert_eq!(
            commands(&["[[ -n $x && -f file ]] && act", "[ -z \"$y\" ] || recover"]),
            vec!["act", "[", "recover"]
        );
    }

    #[test]
    fn test_case_patterns_are_not_commands() {
        let mut lexer = Lexer::new();
        let lines = [
            "case \"$1\" in",
            "  start|begin)",
            "    do_start",
            "    ;;",
            "  stop) do_stop ;;",
            "esac",
        ];
        let names: Vec<String> = lines
            .iter()
            .flat_map(|l| {
                lexer
                    .scan_line(l)
                    .commands()
                    .map(|c| c.name.clone())
                    .collect::<Vec<_>>()
            })
            .collect();
        assert_eq!(names, vec!["do_start", "do_stop"]);
    }

    #[test]
    fn test_heredoc_body_is_skipped() {
        let mut lexer = Lexer::new();
        assert_eq!(
            lexer.scan_line("cat <<EOF").commands().count(),
            1,
            "cat is the command"
        );
        let body = lexer.scan_line("helper should not count $HOME_DIR");
        assert!(body.heredoc_body);
        assert!(body.events.is_empty());
        assert_eq!(body.vars, vec!["HOME_DIR"]);
        assert!(lexer.scan_line("EOF").heredoc_body);
        assert_eq!(
            lexer.scan_line("after").commands().next().map(|c| c.name.as_str()),
            Some("after")
        );
    }

    #[test]
    fn test_quoted_heredoc_does_not_expand() {
        let mut lexer = Lexer::new();
        lexer.scan_line("cat <<-'END'");
        let body = lexer.scan_line("\t$NOT_EXPANDED");
        assert!(body.vars.is_empty());
        assert!(lexer.scan_line("\tEND").heredoc_body);
        assert!(lexer.at_top());
    }

    #[test]
    fn test_multiline_string() {
        let mut lexer = Lexer::new();
        let first = lexer.scan_line("echo \"first line");
        assert_eq!(first.commands().count(), 1);
        assert!(!lexer.at_top());
        let second = lexer.scan_line("helper still quoted\" && real_call");
        let names: Vec<_> = second.commands().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["real_call"]);
        assert!(lexer.at_top());
    }

    #[test]
    fn test_braces() {
        let mut lexer = Lexer::new();
        let scan = lexer.scan_line("helper() { inner; }");
        assert_eq!(
            scan.events,
            vec![
                Event::Command(Command {
                    name: "helper".into(),
                    plain: true,
                    first_arg: None,
                }),
                Event::Open,
                Event::Command(Command {
                    name: "inner".into(),
                    plain: true,
                    first_arg: None,
                }),
                Event::Close,
            ]
        );
        let scan = lexer.scan_line("echo ${name} {a,b} \"}\"");
        assert!(!scan.events.contains(&Event::Open));
        assert!(!scan.events.contains(&Event::Close));
    }

    #[test]
    fn test_function_keyword_name_is_skipped() {
        let mut lexer = Lexer::new();
        let scan = lexer.scan_line("function setup {");
        assert_eq!(scan.events, vec![Event::Open]);
        assert!(scan.args.is_empty());
    }

    #[test]
    fn test_first_argument_is_captured() {
        let mut lexer = Lexer::new();
        let scan = lexer.scan_line("source \"${UTILITYPATH}/Prompts.sh\" || exit 1");
        let cmd = scan.commands().next().unwrap();
        assert_eq!(cmd.name, "source");
        assert_eq!(cmd.first_arg.as_deref(), Some("\"${UTILITYPATH}/Prompts.sh\""));
        assert!(scan.vars.contains(&"UTILITYPATH".to_string()));
    }

    #[test]
    fn test_dynamic_dispatch() {
        let mut lexer = Lexer::new();
        let scan = lexer.scan_line("\"$handler\" arg");
        assert!(scan.dynamic);
        assert_eq!(scan.commands().count(), 0);
        let scan = lexer.scan_line("$cmd --go");
        assert!(scan.dynamic);
        let scan = lexer.scan_line("eval \"$generated\"");
        assert!(scan.dynamic);
    }

    #[test]
    fn test_redirect_targets_are_not_words() {
        let mut lexer = Lexer::new();
        let scan = lexer.scan_line("helper > output_file 2>&1 < input_file");
        assert_eq!(scan.commands().count(), 1);
        assert!(!scan.args.contains(&"output_file".to_string()));
        assert!(!scan.args.contains(&"input_file".to_string()));
    }

    #[test]
    fn test_is_assignment() {
        assert!(is_assignment("NAME=value"));
        assert!(is_assignment("count+=1"));
        assert!(is_assignment("arr[3]=x"));
        assert!(!is_assignment("--opt=value"));
        assert!(!is_assignment("echo"));
    }
}
