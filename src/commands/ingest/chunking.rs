/// Greedy word-boundary packing: words accumulate until the next one would
/// push the chunk past `max_chars`; each new chunk starts with the previous
/// chunk's trailing words up to `overlap_chars`. A single word longer than
/// the budget becomes its own chunk rather than being split mid-word.
pub(crate) fn split_text_with_overlap(
    text: &str,
    max_chars: usize,
    overlap_chars: usize,
) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = Vec::<&str>::new();
    let mut current_chars = 0usize;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        let added_chars = joined_chars(&current, word_chars);

        if !current.is_empty() && current_chars + added_chars > max_chars {
            chunks.push(current.join(" "));

            let (overlap, overlap_len) = trailing_overlap(&current, overlap_chars);
            current = overlap;
            current_chars = overlap_len + joined_chars(&current, word_chars);
            current.push(word);
            continue;
        }

        current_chars += added_chars;
        current.push(word);
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

fn joined_chars(current: &[&str], word_chars: usize) -> usize {
    if current.is_empty() {
        word_chars
    } else {
        word_chars + 1
    }
}

fn trailing_overlap<'a>(words: &[&'a str], overlap_chars: usize) -> (Vec<&'a str>, usize) {
    let mut overlap = Vec::<&'a str>::new();
    let mut length = 0usize;

    for word in words.iter().rev() {
        let word_chars = word.chars().count();
        let added_chars = joined_chars(&overlap, word_chars);
        if length + added_chars > overlap_chars {
            break;
        }
        overlap.push(word);
        length += added_chars;
    }

    overlap.reverse();
    (overlap, length)
}
