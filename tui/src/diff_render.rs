use ratatui::style::Color;
use ratatui::style::Modifier;
use ratatui::style::Style;
use ratatui::text::Line as RtLine;
use ratatui::text::Span as RtSpan;

/// One file's section of a combined preview.
#[derive(Debug, PartialEq)]
struct FileDiff<'a> {
    display_path: &'a str,
    text: String,
}

#[derive(Debug, PartialEq)]
struct FileSummary {
    display_path: String,
    added: usize,
    removed: usize,
}

/// Split a preview made of concatenated unified diffs at each `---`/`+++`
/// header pair.
fn split_files(preview: &str) -> Vec<FileDiff<'_>> {
    let lines: Vec<&str> = preview.lines().collect();
    let mut files: Vec<FileDiff<'_>> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let next = lines.get(idx + 1).copied().unwrap_or_default();
        if line.starts_with("--- ") && next.starts_with("+++ ") {
            let new_name = &next[4..];
            let display_path = if new_name == "(deleted)" {
                &line[4..]
            } else {
                new_name
            };
            files.push(FileDiff {
                display_path,
                text: String::new(),
            });
        }
        if let Some(file) = files.last_mut() {
            file.text.push_str(line);
            file.text.push('\n');
        }
    }
    files
}

/// Count additions/deletions from a unified diff body.
fn count_changes(diff: &str) -> (usize, usize) {
    if let Ok(patch) = diffy::Patch::from_str(diff) {
        let mut adds = 0usize;
        let mut dels = 0usize;
        for hunk in patch.hunks() {
            for line in hunk.lines() {
                match line {
                    diffy::Line::Insert(_) => adds += 1,
                    diffy::Line::Delete(_) => dels += 1,
                    diffy::Line::Context(_) => {}
                }
            }
        }
        return (adds, dels);
    }
    diff.lines()
        .filter(|l| !(l.starts_with("+++") || l.starts_with("---") || l.starts_with("@@")))
        .fold((0, 0), |(adds, dels), l| match l.as_bytes().first() {
            Some(b'+') => (adds + 1, dels),
            Some(b'-') => (adds, dels + 1),
            _ => (adds, dels),
        })
}

fn summarize(preview: &str) -> Vec<FileSummary> {
    split_files(preview)
        .into_iter()
        .map(|file| {
            let (added, removed) = count_changes(&file.text);
            FileSummary {
                display_path: file.display_path.to_string(),
                added,
                removed,
            }
        })
        .collect()
}

fn counts_spans(added: usize, removed: usize) -> Vec<RtSpan<'static>> {
    vec![
        RtSpan::raw("("),
        RtSpan::styled(format!("+{added}"), Style::default().fg(Color::Green)),
        RtSpan::raw(" "),
        RtSpan::styled(format!("-{removed}"), Style::default().fg(Color::Red)),
        RtSpan::raw(")"),
    ]
}

/// `<title> to N files (+A -R)` followed by one dimmed line per file.
pub(crate) fn create_diff_summary(title: &str, preview: &str) -> Vec<RtLine<'static>> {
    let files = summarize(preview);
    let file_count = files.len();
    let total_added: usize = files.iter().map(|f| f.added).sum();
    let total_removed: usize = files.iter().map(|f| f.removed).sum();
    let noun = if file_count == 1 { "file" } else { "files" };

    let mut header_spans: Vec<RtSpan<'static>> = vec![
        RtSpan::styled(
            title.to_owned(),
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ),
        RtSpan::raw(format!(" to {file_count} {noun} ")),
    ];
    header_spans.extend(counts_spans(total_added, total_removed));

    let mut out = vec![RtLine::from(header_spans)];
    for (idx, f) in files.iter().enumerate() {
        let prefix = if idx == 0 { "  ⎿ " } else { "    " };
        let mut spans = vec![
            RtSpan::raw(prefix),
            RtSpan::raw(format!("{} ", f.display_path)),
        ];
        spans.extend(counts_spans(f.added, f.removed));
        for span in &mut spans {
            span.style = span.style.add_modifier(Modifier::DIM);
        }
        out.push(RtLine::from(spans));
    }
    out
}

/// Parse the starting line numbers out of `@@ -a,b +c,d @@`.
fn hunk_start(header: &str) -> Option<(usize, usize)> {
    let mut parts = header.split_whitespace().skip(1);
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;
    let start = |range: &str| range.split(',').next()?.parse::<usize>().ok();
    Some((start(old)?, start(new)?))
}

/// Colour a unified diff for display: additions green, removals red, hunk
/// headers cyan, file headers and line numbers dim.
pub(crate) fn render_unified_diff(preview: &str) -> Vec<RtLine<'static>> {
    let dim = Style::default().add_modifier(Modifier::DIM);
    let gutter = |n: Option<usize>| match n {
        Some(n) => RtSpan::styled(format!("{n:>5} "), dim),
        None => RtSpan::styled("      ", dim),
    };

    let mut out = Vec::new();
    let (mut old_ln, mut new_ln) = (0usize, 0usize);
    for line in preview.lines() {
        if line.starts_with("--- ") || line.starts_with("+++ ") {
            out.push(RtLine::from(RtSpan::styled(line.to_string(), dim)));
        } else if line.starts_with("@@") {
            if let Some((old, new)) = hunk_start(line) {
                old_ln = old;
                new_ln = new;
            }
            out.push(RtLine::from(RtSpan::styled(
                line.to_string(),
                Style::default().fg(Color::Cyan),
            )));
        } else if let Some(rest) = line.strip_prefix('+') {
            out.push(RtLine::from(vec![
                gutter(Some(new_ln)),
                RtSpan::styled(format!("+{rest}"), Style::default().fg(Color::Green)),
            ]));
            new_ln += 1;
        } else if let Some(rest) = line.strip_prefix('-') {
            out.push(RtLine::from(vec![
                gutter(Some(old_ln)),
                RtSpan::styled(format!("-{rest}"), Style::default().fg(Color::Red)),
            ]));
            old_ln += 1;
        } else if line.starts_with('\\') {
            out.push(RtLine::from(vec![
                gutter(None),
                RtSpan::styled(line.to_string(), dim),
            ]));
        } else {
            out.push(RtLine::from(vec![
                gutter(Some(new_ln)),
                RtSpan::raw(line.to_string()),
            ]));
            old_ln += 1;
            new_ln += 1;
        }
    }
    out
}
