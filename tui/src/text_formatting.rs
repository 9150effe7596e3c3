use unicode_segmentation::UnicodeSegmentation;

/// Progress label for an agent tool. Unknown tools are title-cased from their
/// snake_case name.
pub(crate) fn tool_display_name(tool_name: &str) -> String {
    let known = match tool_name {
        "apply_patch" => Some("Applying changes"),
        "read_file" => Some("Reading file"),
        "list_files" => Some("Listing files"),
        "web_search" => Some("Searching web"),
        "get_market_data" => Some("Loading market data"),
        "get_token_price" => Some("Loading price"),
        "get_wallet_info" => Some("Loading wallet"),
        _ => None,
    };
    match known {
        Some(label) => label.to_string(),
        None => title_case(tool_name),
    }
}

fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Truncate `text` to at most `max_graphemes` graphemes, ending in `...` when
/// there is room for it. Works on graphemes so multi-codepoint characters are
/// never split.
pub(crate) fn truncate_text(text: &str, max_graphemes: usize) -> String {
    let cut_at = |n: usize| text.grapheme_indices(true).nth(n).map(|(idx, _)| idx);
    if cut_at(max_graphemes).is_none() {
        return text.to_string();
    }
    if max_graphemes < 3 {
        let end = cut_at(max_graphemes).unwrap_or(text.len());
        return text[..end].to_string();
    }
    let end = cut_at(max_graphemes - 3).unwrap_or(text.len());
    format!("{}...", &text[..end])
}
