use std::sync::LazyLock;

use regex::Regex;

const HOST_PATTERNS: [&str; 4] = [
	r"(?i)\b[a-z]+-[a-z]+-\d+\b",
	r"(?i)\b[a-z]+[_-][a-z]+[_-]\d+\b",
	r"(?i)\b[a-z]+\d+\b",
	r"(?i)\b[a-z]+-\d+\b",
];
const NOT_HOSTS: [&str; 6] = ["localhost", "admin", "user", "root", "test", "example"];

static HOST_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	HOST_PATTERNS
		.iter()
		.map(|pattern| Regex::new(pattern).expect("Host name regex is valid."))
		.collect()
});

/// Host-like names in `texts`, lowercased, in order of first appearance.
///
/// A match nested inside a longer match is not reported separately, so `web-prod-01`
/// does not also yield `prod-01`.
pub fn extract_hosts<'a, I>(texts: I) -> Vec<String>
where
	I: IntoIterator<Item = &'a str>,
{
	let mut hosts: Vec<String> = Vec::new();

	for text in texts {
		let mut spans: Vec<(usize, usize)> = HOST_RES
			.iter()
			.flat_map(|re| re.find_iter(text).map(|found| (found.start(), found.end())))
			.collect();

		spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

		let mut covered_until = 0;

		for (start, end) in spans {
			if start < covered_until {
				continue;
			}

			covered_until = end;

			let name = text[start..end].to_lowercase();

			if NOT_HOSTS.contains(&name.as_str()) || hosts.contains(&name) {
				continue;
			}

			hosts.push(name);
		}
	}

	hosts
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_common_host_shapes() {
		let hosts = extract_hosts(["Disk full on WEB-PROD-01 and db_main_2, then app3 and mail-7."]);

		assert_eq!(hosts, vec![
			"web-prod-01".to_string(),
			"db_main_2".to_string(),
			"app3".to_string(),
			"mail-7".to_string(),
		]);
	}

	#[test]
	fn nested_matches_are_not_reported() {
		assert_eq!(extract_hosts(["web-prod-01"]), vec!["web-prod-01".to_string()]);
	}

	#[test]
	fn deduplicates_across_texts() {
		assert_eq!(extract_hosts(["db01 restarted", "DB01 healthy"]), vec!["db01".to_string()]);
	}

	#[test]
	fn plain_words_are_ignored() {
		assert!(extract_hosts(["restarted the service", "localhost"]).is_empty());
	}
}
