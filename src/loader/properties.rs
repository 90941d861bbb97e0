use std::collections::BTreeMap;

/// Parse `key=value` (or `key: value`) lines; `#` and `!` start comment lines
///
/// Keys and values are trimmed. A line without a separator is a key with an empty
/// value. A key may appear only once per file.
pub fn parse_properties(content: &str) -> Result<BTreeMap<String, String>, String> {
    let mut properties = BTreeMap::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.find(['=', ':']) {
            Some(index) => (line[..index].trim(), line[index + 1..].trim()),
            None => (line, ""),
        };
        if key.is_empty() {
            return Err(format!("line {}: property has an empty key", number + 1));
        }
        if properties.insert(key.to_string(), value.to_string()).is_some() {
            return Err(format!("line {}: duplicate property '{}'", number + 1, key));
        }
    }
    Ok(properties)
}
