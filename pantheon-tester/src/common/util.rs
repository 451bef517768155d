pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Pretty label for an influence table, strongest first.
pub fn format_influence(entries: &[(String, f64)]) -> String {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
        .iter()
        .map(|(id, value)| format!("{id} {value:.1}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" alpha, ,beta,  gamma ");
        assert_eq!(parts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn influence_is_listed_strongest_first() {
        let entries = vec![
            ("b".to_string(), 10.0),
            ("a".to_string(), 30.0),
            ("c".to_string(), 10.0),
        ];
        assert_eq!(format_influence(&entries), "a 30.0, b 10.0, c 10.0");
    }
}
