use std::collections::HashSet;

/// Trim, drop empties, and keep each distinct command once.
///
/// With `keep_newest` the input is read as oldest-first: the result comes back
/// newest-first and each command sits where it was last run. Without it the
/// first occurrence in the given order wins and the order is preserved.
pub fn dedupe<S: AsRef<str>>(commands: &[S], keep_newest: bool) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(commands.len());

    let mut push = |cmd: &S| {
        let trimmed = cmd.as_ref().trim();
        if !trimmed.is_empty() && seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    };

    if keep_newest {
        commands.iter().rev().for_each(&mut push);
    } else {
        commands.iter().for_each(&mut push);
    }

    out
}
