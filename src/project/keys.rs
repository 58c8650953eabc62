// Store keys - fixed-width hexadecimal key shapes of a composition

use crate::sheet::column::ColumnId;

pub const CONTROL_MAP: &str = "p_control_map.json";
pub const ENVIRONMENT: &str = "p_environment.json";
pub const PATTERN_HEADER: &str = "p_pattern.json";
pub const TRIGGERS: &str = "p_triggers.json";
pub const SONG_HEADER: &str = "p_song.json";
pub const ORDER_LIST: &str = "p_order_list.json";

/// `pat_XXX`
pub fn pattern_dir(pattern: usize) -> String {
    format!("pat_{:03x}", pattern)
}

/// `col_YY`, or `gcol` for the global column
pub fn column_dir(column: ColumnId) -> String {
    match column {
        ColumnId::Global => "gcol".to_string(),
        ColumnId::Channel(n) => format!("col_{:02x}", n),
    }
}

/// `song_XX`
pub fn song_dir(song: usize) -> String {
    format!("song_{:02x}", song)
}

pub fn pattern_header(pattern: usize) -> String {
    format!("{}/{}", pattern_dir(pattern), PATTERN_HEADER)
}

pub fn triggers(pattern: usize, column: ColumnId) -> String {
    format!("{}/{}/{}", pattern_dir(pattern), column_dir(column), TRIGGERS)
}

pub fn song_header(song: usize) -> String {
    format!("{}/{}", song_dir(song), SONG_HEADER)
}

pub fn order_list(song: usize) -> String {
    format!("{}/{}", song_dir(song), ORDER_LIST)
}

/// Parse a `<prefix>_<hex>` path component of exactly `width` digits
pub fn parse_indexed(component: &str, prefix: &str, width: usize) -> Option<usize> {
    let digits = component.strip_prefix(prefix)?.strip_prefix('_')?;
    if digits.len() != width || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    usize::from_str_radix(digits, 16).ok()
}

/// Parse a column directory name
pub fn parse_column(component: &str) -> Option<ColumnId> {
    if component == "gcol" {
        return Some(ColumnId::Global);
    }
    parse_indexed(component, "col", 2).map(ColumnId::Channel)
}

/// A store key is non-empty, relative and free of `.`/`..` components
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && key
            .split('/')
            .all(|c| !c.is_empty() && c != "." && c != ".." && !c.contains('\\'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(pattern_header(0x1a), "pat_01a/p_pattern.json");
        assert_eq!(triggers(2, ColumnId::Channel(11)), "pat_002/col_0b/p_triggers.json");
        assert_eq!(triggers(2, ColumnId::Global), "pat_002/gcol/p_triggers.json");
        assert_eq!(order_list(3), "song_03/p_order_list.json");
    }

    #[test]
    fn test_parse_components() {
        assert_eq!(parse_indexed("pat_01a", "pat", 3), Some(0x1a));
        assert_eq!(parse_indexed("pat_1a", "pat", 3), None);
        assert_eq!(parse_indexed("pat_0g0", "pat", 3), None);
        assert_eq!(parse_indexed("song_ff", "song", 2), Some(255));
        assert_eq!(parse_column("col_3f"), Some(ColumnId::Channel(63)));
        assert_eq!(parse_column("gcol"), Some(ColumnId::Global));
        assert_eq!(parse_column("col_x"), None);
    }

    #[test]
    fn test_key_validation() {
        assert!(is_valid_key("ins_00/p_manifest.json"));
        assert!(!is_valid_key("/etc/passwd"));
        assert!(!is_valid_key("pat_000/../x"));
        assert!(!is_valid_key("a//b"));
        assert!(!is_valid_key(""));
    }
}
