//! Document-aware text splitter shared by AnalysisEngine chunking (C4) and
//! RAGIndex chunking (C6). Both split on markdown headers first, then
//! recursively split oversized sections using progressively finer
//! separators — the two callers differ only in `SplitterConfig` (chunk size
//! and overlap), not in the splitting algorithm itself.

/// Rough token estimation: words / 0.75 (WordPiece averages ~1.3 tokens/word).
/// Kept as an estimate, not an exact tokenizer call, so splitting never
/// depends on which model/tokenizer is configured for a given task.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    ((words as f32) / 0.75).ceil() as usize
}

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size_tokens: usize,
    pub overlap_tokens: usize,
}

impl SplitterConfig {
    /// C6 RAGIndex defaults (§4.6): 1000 tokens, 200 overlap.
    pub fn rag_default() -> Self {
        Self { chunk_size_tokens: 1000, overlap_tokens: 200 }
    }

    /// C4 AnalysisEngine defaults (§4.4): fixed 200-token overlap; chunk
    /// size is derived by the caller from the model's context window and
    /// the chosen strategy (refine vs. map-reduce), so no default size here.
    pub fn analysis(chunk_size_tokens: usize) -> Self {
        Self { chunk_size_tokens, overlap_tokens: 200 }
    }
}

/// One split unit: the markdown heading chain it falls under (outermost
/// first) plus its text and an estimated token count.
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub heading_path: Vec<String>,
    pub text: String,
    pub token_count: usize,
}

/// Split `markdown` into chunks no larger than `config.chunk_size_tokens`
/// (best-effort — a single oversized sentence is not split further).
pub fn split_markdown(markdown: &str, config: &SplitterConfig) -> Vec<TextChunk> {
    let sections = split_by_headers(markdown);
    let mut out = Vec::new();
    for (heading_path, body) in sections {
        if body.trim().is_empty() {
            continue;
        }
        if estimate_tokens(&body) <= config.chunk_size_tokens {
            out.push(TextChunk { heading_path, text: body.trim().to_string(), token_count: estimate_tokens(&body) });
            continue;
        }
        for piece in recursive_split(&body, config) {
            out.push(TextChunk {
                heading_path: heading_path.clone(),
                token_count: estimate_tokens(&piece),
                text: piece,
            });
        }
    }
    out
}

/// Split markdown on `#`-style headers, returning (heading-chain, body)
/// pairs. The heading chain tracks nesting (e.g. `["Methods", "Data Collection"]`).
fn split_by_headers(markdown: &str) -> Vec<(Vec<String>, String)> {
    let mut sections: Vec<(Vec<String>, String)> = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut current_body = String::new();

    let flush = |stack: &[(usize, String)], body: &str, sections: &mut Vec<(Vec<String>, String)>| {
        if !body.trim().is_empty() {
            let chain = stack.iter().map(|(_, h)| h.clone()).collect();
            sections.push((chain, body.to_string()));
        }
    };

    for line in markdown.lines() {
        if let Some(level_and_title) = parse_header(line) {
            flush(&stack, &current_body, &mut sections);
            current_body.clear();
            let (level, title) = level_and_title;
            while stack.last().is_some_and(|(l, _)| *l >= level) {
                stack.pop();
            }
            stack.push((level, title));
        } else {
            current_body.push_str(line);
            current_body.push('\n');
        }
    }
    flush(&stack, &current_body, &mut sections);

    if sections.is_empty() && !markdown.trim().is_empty() {
        sections.push((vec![], markdown.to_string()));
    }
    sections
}

fn parse_header(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = trimmed[level..].trim();
    if rest.is_empty() {
        return None;
    }
    Some((level, rest.to_string()))
}

/// Recursively split an oversized section: paragraph boundaries first, then
/// sentence boundaries, then a fixed-size token window as a last resort.
/// Consecutive pieces overlap by `config.overlap_tokens`.
fn recursive_split(body: &str, config: &SplitterConfig) -> Vec<String> {
    let paragraphs: Vec<&str> = body.split("\n\n").filter(|p| !p.trim().is_empty()).collect();
    let units: Vec<String> = if paragraphs.len() > 1 {
        paragraphs.into_iter().map(str::to_string).collect()
    } else {
        split_sentences(body)
    };

    window_units(&units, config)
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            sentences.push(current.trim().to_string());
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }
    if sentences.is_empty() {
        vec![text.to_string()]
    } else {
        sentences
    }
}

/// Greedily pack `units` (paragraphs or sentences) into windows near
/// `chunk_size_tokens`, carrying the trailing `overlap_tokens` worth of the
/// previous window into the next.
fn window_units(units: &[String], config: &SplitterConfig) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0usize;

    for unit in units {
        let unit_tokens = estimate_tokens(unit);
        if current_tokens + unit_tokens > config.chunk_size_tokens && !current.is_empty() {
            out.push(current.join("\n\n"));
            current = carry_overlap(&current, config.overlap_tokens);
            current_tokens = current.iter().map(|u| estimate_tokens(u)).sum();
        }
        current.push(unit.clone());
        current_tokens += unit_tokens;
    }
    if !current.is_empty() {
        out.push(current.join("\n\n"));
    }
    if out.is_empty() {
        out.push(units.join("\n\n"));
    }
    out
}

fn carry_overlap(units: &[String], overlap_tokens: usize) -> Vec<String> {
    let mut carried = Vec::new();
    let mut tokens = 0usize;
    for unit in units.iter().rev() {
        if tokens >= overlap_tokens {
            break;
        }
        tokens += estimate_tokens(unit);
        carried.push(unit.clone());
    }
    carried.reverse();
    carried
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_headers_and_tracks_heading_chain() {
        let md = "# Title\n\nintro text\n\n## Methods\n\nwe did things.\n";
        let chunks = split_markdown(md, &SplitterConfig::rag_default());
        assert!(chunks.iter().any(|c| c.heading_path == vec!["Title".to_string(), "Methods".to_string()]));
    }

    #[test]
    fn oversized_section_is_recursively_split() {
        let body = "sentence one. ".repeat(2000);
        let md = format!("# Results\n\n{body}");
        let config = SplitterConfig { chunk_size_tokens: 50, overlap_tokens: 10 };
        let chunks = split_markdown(&md, &config);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn short_section_is_a_single_chunk() {
        let md = "# Abstract\n\nShort abstract text.\n";
        let chunks = split_markdown(md, &SplitterConfig::rag_default());
        assert_eq!(chunks.len(), 1);
    }
}
