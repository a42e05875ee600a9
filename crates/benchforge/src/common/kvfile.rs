//! Line-oriented parser for the flat `[section]` / `key = value` format used
//! by configuration profiles and job reports. Key case is preserved.

/// Parses sectioned key/value text. Repeated sections are merged in order of
/// first appearance; repeated keys within a section keep the last value.
pub fn parse_sections(text: &str) -> Result<Vec<(String, Vec<(String, String)>)>, String> {
    let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
    let mut current: Option<usize> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let name = header
                .strip_suffix(']')
                .ok_or_else(|| format!("line {}: unterminated section header", index + 1))?
                .trim();
            if name.is_empty() {
                return Err(format!("line {}: empty section name", index + 1));
            }
            current = Some(match sections.iter().position(|(n, _)| n == name) {
                Some(position) => position,
                None => {
                    sections.push((name.to_string(), Vec::new()));
                    sections.len() - 1
                }
            });
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| format!("line {}: expected `key = value`", index + 1))?;
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(format!("line {}: empty key", index + 1));
        }
        let value = value.trim().to_string();

        match current {
            Some(position) => {
                let entries = &mut sections[position].1;
                entries.retain(|(existing, _)| existing != &key);
                entries.push((key, value));
            }
            None => return Err(format!("line {}: key outside of any section", index + 1)),
        }
    }

    Ok(sections)
}

#[cfg(test)]
mod test {
    use super::parse_sections;

    #[test]
    fn test_parse_basic() {
        let text = "[general]\ncode = gromacs\nversion = 2021\n\n[config]\nbuild_label = default\n";
        let sections = parse_sections(text).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, "general");
        assert_eq!(
            sections[0].1,
            vec![
                ("code".to_string(), "gromacs".to_string()),
                ("version".to_string(), "2021".to_string()),
            ]
        );
        assert_eq!(sections[1].0, "config");
    }

    #[test]
    fn test_key_case_preserved() {
        let sections = parse_sections("[result]\nPerf_Unit = ns/day\n").unwrap();
        assert_eq!(sections[0].1[0].0, "Perf_Unit");
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let text = "# top comment\n[general]\n; other comment\n\ncode = lammps\n";
        let sections = parse_sections(text).unwrap();
        assert_eq!(
            sections[0].1,
            vec![("code".to_string(), "lammps".to_string())]
        );
    }

    #[test]
    fn test_key_outside_section_is_error() {
        assert!(parse_sections("code = lammps\n").is_err());
    }

    #[test]
    fn test_malformed_line_is_error() {
        assert!(parse_sections("[general]\nnot a kv line\n").is_err());
    }

    #[test]
    fn test_merged_duplicate_section() {
        let text = "[build]\na = 1\n[bench]\nb = 2\n[build]\nc = 3\n";
        let sections = parse_sections(text).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].1.len(), 2);
    }

    #[test]
    fn test_value_containing_equals() {
        let sections = parse_sections("[config]\nopt_flags = -O2 -DNDEBUG=1\n").unwrap();
        assert_eq!(sections[0].1[0].1, "-O2 -DNDEBUG=1");
    }
}
