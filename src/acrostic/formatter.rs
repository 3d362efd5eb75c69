#![forbid(unsafe_code)]

// ***************************************************************************
//                               Display Units
// ***************************************************************************
/// One rendered line of a generated poem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayUnit {
    /// A `label: sentence` line shown with the input character at the same
    /// position, which is empty past the end of the word.
    Labeled { character: String, sentence: String },
    /// A line without a colon, shown as is.
    Raw { line: String },
}

// ---------------------------------------------------------------------------
// format_result:
// ---------------------------------------------------------------------------
/** Split generated text into display units.  Blank lines are dropped and the
 * label the generator wrote before the first colon is replaced by the input
 * character at that line's position.  Malformed text never fails, it just
 * degrades to raw lines.
 */
pub fn format_result(raw_text: &str, input: &str) -> Vec<DisplayUnit> {
    let chars: Vec<char> = input.chars().collect();

    raw_text
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| match line.split_once(':') {
            Some((_, sentence)) => DisplayUnit::Labeled {
                character: chars.get(i).map(|c| c.to_string()).unwrap_or_default(),
                sentence: sentence.trim().to_string(),
            },
            None => DisplayUnit::Raw { line: line.to_string() },
        })
        .collect()
}
