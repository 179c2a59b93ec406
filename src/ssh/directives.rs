// file: src/ssh/directives.rs
// version: 1.1.0
// guid: sshdir01-2345-6789-abcd-ef0123456789

//! sshd directives managed by the guard, rendered as a drop-in or merged
//! into the main configuration

const MANAGED_HEADER: &str = "# Managed by host-baseline-agent";

/// One `Keyword value` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub keyword: &'static str,
    pub value: String,
}

impl Directive {
    fn new(keyword: &'static str, value: impl Into<String>) -> Self {
        Self {
            keyword,
            value: value.into(),
        }
    }

    pub fn line(&self) -> String {
        format!("{} {}", self.keyword, self.value)
    }
}

/// The full managed set for a port and password decision
pub fn managed_directives(port: u16, password_auth_enabled: bool) -> Vec<Directive> {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    vec![
        Directive::new("Port", port.to_string()),
        Directive::new("PasswordAuthentication", yes_no(password_auth_enabled)),
        Directive::new("ChallengeResponseAuthentication", "no"),
        Directive::new("UsePAM", "yes"),
        Directive::new("ClientAliveInterval", "60"),
        Directive::new("ClientAliveCountMax", "3"),
    ]
}

pub fn render_drop_in(directives: &[Directive]) -> String {
    let mut out = format!("{}\n", MANAGED_HEADER);
    for directive in directives {
        out.push_str(&directive.line());
        out.push('\n');
    }
    out
}

/// Keyword of an active line. sshd accepts both `Key value` and `Key=value`.
fn keyword_of(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    trimmed
        .split(|c: char| c.is_whitespace() || c == '=')
        .next()
        .filter(|k| !k.is_empty())
}

fn is_keyword(line: &str, keyword: &str) -> bool {
    keyword_of(line).is_some_and(|k| k.eq_ignore_ascii_case(keyword))
}

fn is_managed(line: &str, directives: &[Directive]) -> Option<usize> {
    keyword_of(line).and_then(|k| {
        directives
            .iter()
            .position(|d| d.keyword.eq_ignore_ascii_case(k))
    })
}

/// Whether a drop-in would actually set the managed directives.
///
/// sshd keeps the first value it reads for a keyword, so the drop-in
/// directory must be included in the global section before any active
/// managed keyword in the main file.
pub fn drop_in_takes_effect(main_config: &str, directives: &[Directive]) -> bool {
    for line in main_config.lines() {
        if is_keyword(line, "Match") {
            return false;
        }
        if is_keyword(line, "Include") && line.contains("sshd_config.d") {
            return true;
        }
        if is_managed(line, directives).is_some() {
            return false;
        }
    }
    false
}

/// Merge the managed directives into the global section of a main config.
///
/// Everything is settled before the first `Include` or `Match`, whichever
/// comes first: the first active occurrence of each keyword above that
/// point is replaced in place, missing keywords are inserted just before
/// it, and later active occurrences in the global section are commented
/// out. Lines inside `Match` blocks are not touched.
pub fn merge_main_config(existing: &str, directives: &[Directive]) -> String {
    let lines: Vec<&str> = existing.lines().collect();
    let match_at = lines
        .iter()
        .position(|line| is_keyword(line, "Match"))
        .unwrap_or(lines.len());
    let insert_at = lines[..match_at]
        .iter()
        .position(|line| is_keyword(line, "Include"))
        .unwrap_or(match_at);

    let mut placed = vec![false; directives.len()];
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + directives.len() + 2);

    for line in &lines[..insert_at] {
        match is_managed(line, directives) {
            Some(i) if !placed[i] => {
                out.push(directives[i].line());
                placed[i] = true;
            }
            Some(_) => out.push(format!("# {}", line.trim_start())),
            None => out.push(line.to_string()),
        }
    }

    let missing: Vec<&Directive> = directives
        .iter()
        .zip(&placed)
        .filter(|(_, done)| !**done)
        .map(|(d, _)| d)
        .collect();
    if !missing.is_empty() {
        if out.last().is_some_and(|l| !l.trim().is_empty()) {
            out.push(String::new());
        }
        out.push(MANAGED_HEADER.to_string());
        out.extend(missing.iter().map(|d| d.line()));
        if insert_at < lines.len() {
            out.push(String::new());
        }
    }

    for line in &lines[insert_at..match_at] {
        match is_managed(line, directives) {
            Some(_) => out.push(format!("# {}", line.trim_start())),
            None => out.push(line.to_string()),
        }
    }

    out.extend(lines[match_at..].iter().map(|l| l.to_string()));
    out.join("\n") + "\n"
}
