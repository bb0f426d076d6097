use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Loads class names, one per line. Blank lines are skipped.
pub fn load_labels(filepath: &Path) -> io::Result<Vec<String>> {
    let file = File::open(filepath)?;
    let reader = io::BufReader::new(file);
    let mut labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let name = line.trim();
        if !name.is_empty() {
            labels.push(name.to_string());
        }
    }

    Ok(labels)
}

pub fn class_name(labels: &[String], class_id: usize) -> String {
    labels
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("unknown class {}", class_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_labels_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "helmet\n\nvest\nboots").unwrap();

        let labels = load_labels(file.path()).unwrap();
        assert_eq!(labels, vec!["helmet", "vest", "boots"]);
    }

    #[test]
    fn test_class_name_out_of_range() {
        let labels = vec!["helmet".to_string()];
        assert_eq!(class_name(&labels, 0), "helmet");
        assert_eq!(class_name(&labels, 7), "unknown class 7");
    }
}
