use crate::CfError;

/// Excel 最大列 XFD
pub const MAX_COLUMN: u32 = 16_384;

/// "A" -> 1, "Z" -> 26, "AA" -> 27；大小写不敏感，超出 XFD 返回 None。
pub fn column_to_index(name: &str) -> Option<u32> {
    let name = name.trim();
    if name.is_empty() || name.len() > 3 {
        return None;
    }

    let mut index = 0u32;
    for ch in name.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A' + 1) as u32;
        index = index * 26 + digit;
    }

    (index <= MAX_COLUMN).then_some(index)
}

pub fn index_to_column(mut column: u32) -> String {
    // 1 -> A, 26 -> Z, 27 -> AA ...
    let mut name = String::new();
    while column > 0 {
        let rem = ((column - 1) % 26) as u8;
        name.insert(0, (b'A' + rem) as char);
        column = (column - 1) / 26;
    }
    name
}

/// 校验并转换为大写列名。
pub fn normalize_column(name: &str) -> Result<String, CfError> {
    column_to_index(name)
        .map(index_to_column)
        .ok_or_else(|| CfError::InvalidColumn(name.trim().to_string()))
}

pub fn range_ref(start_col: &str, end_col: &str, first_row: u32, last_row: u32) -> String {
    format!("{start_col}{first_row}:{end_col}{last_row}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_to_index() {
        assert_eq!(column_to_index("A"), Some(1));
        assert_eq!(column_to_index("z"), Some(26));
        assert_eq!(column_to_index("AE"), Some(31));
        assert_eq!(column_to_index("XFD"), Some(MAX_COLUMN));
    }

    #[test]
    fn rejects_bad_columns() {
        assert_eq!(column_to_index(""), None);
        assert_eq!(column_to_index("A1"), None);
        assert_eq!(column_to_index("XFE"), None);
        assert_eq!(column_to_index("ABCD"), None);
    }

    #[test]
    fn index_back_to_letters() {
        assert_eq!(index_to_column(1), "A");
        assert_eq!(index_to_column(27), "AA");
        assert_eq!(index_to_column(36), "AJ");
    }

    #[test]
    fn normalize_uppercases() {
        assert_eq!(normalize_column(" ae ").unwrap(), "AE");
        assert_eq!(
            normalize_column("1"),
            Err(CfError::InvalidColumn("1".to_string()))
        );
    }

    #[test]
    fn builds_range() {
        assert_eq!(range_ref("AE", "AJ", 13, 15), "AE13:AJ15");
    }
}
