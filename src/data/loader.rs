//! Element catalog loading from TLE text files

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;

use super::{ElementSet, TrackedObject};
use crate::geo::geodesy::SECONDS_PER_DAY;

/// Element sets in file order, unique by name
#[derive(Debug, Clone, Default)]
pub struct ElementCatalog {
    sets: Vec<ElementSet>,
}

impl ElementCatalog {
    /// Parse CelesTrak style three-line text
    ///
    /// Title lines may carry the `0 ` prefix used by Space-Track 3LE files.
    /// A bare two-line set is named after its catalog number.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim_end()))
            .filter(|(_, l)| !l.trim().is_empty())
            .collect();

        let mut sets = Vec::new();
        let mut seen = HashSet::new();
        let mut title: Option<String> = None;
        let mut i = 0;

        while i < lines.len() {
            let (line_no, line) = lines[i];

            if line.starts_with("1 ") {
                let Some(&(_, line2)) = lines.get(i + 1) else {
                    bail!("line {}: element line 1 without line 2", line_no);
                };
                if !line2.starts_with("2 ") {
                    bail!("line {}: expected element line 2", line_no + 1);
                }

                let mut set = ElementSet {
                    name: String::new(),
                    line1: line.to_string(),
                    line2: line2.to_string(),
                };
                set.name = match title.take() {
                    Some(name) => name,
                    None => match set.catalog_number() {
                        Some(n) => format!("NORAD {}", n),
                        None => bail!("line {}: untitled set without catalog number", line_no),
                    },
                };

                if seen.insert(set.name.clone()) {
                    sets.push(set);
                } else {
                    log::warn!("Duplicate element set for {:?}, keeping the first", set.name);
                }
                i += 2;
                continue;
            }

            let name = line.strip_prefix("0 ").unwrap_or(line).trim();
            title = Some(name.to_string());
            i += 1;
        }

        Ok(Self { sets })
    }

    pub fn sets(&self) -> &[ElementSet] {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ElementSet> {
        self.sets.iter().find(|s| s.name == name)
    }

    /// Objects to track, in catalog order
    ///
    /// An empty `names` list tracks the whole catalog.
    pub fn tracked_objects(&self, names: &[String]) -> Vec<TrackedObject> {
        if names.is_empty() {
            return self.sets.iter().map(ElementSet::tracked_object).collect();
        }

        for name in names {
            if self.get(name).is_none() {
                log::warn!("Requested object {:?} is not in the catalog", name);
            }
        }

        self.sets
            .iter()
            .filter(|s| names.iter().any(|n| *n == s.name))
            .map(ElementSet::tracked_object)
            .collect()
    }
}

/// Load an element catalog, transparently decompressing `.gz` files
pub fn load_catalog(path: impl AsRef<Path>) -> Result<ElementCatalog> {
    let path = path.as_ref();
    log::info!("Loading element catalog from {:?}", path);

    let file =
        File::open(path).with_context(|| format!("Failed to open element catalog: {:?}", path))?;
    let mut reader = BufReader::new(file);

    let mut text = String::new();
    if path.extension().is_some_and(|ext| ext == "gz") {
        GzDecoder::new(reader)
            .read_to_string(&mut text)
            .with_context(|| format!("Failed to decompress element catalog: {:?}", path))?;
    } else {
        reader
            .read_to_string(&mut text)
            .with_context(|| format!("Failed to read element catalog: {:?}", path))?;
    }

    let catalog = ElementCatalog::parse(&text)
        .with_context(|| format!("Failed to parse element catalog: {:?}", path))?;
    log::info!("Loaded {} element sets", catalog.len());

    Ok(catalog)
}

/// Age of a file in days, from its modification time
pub fn file_age_days(path: impl AsRef<Path>) -> Option<f64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let age = SystemTime::now().duration_since(modified).ok()?;
    Some(age.as_secs_f64() / SECONDS_PER_DAY)
}

/// Log a warning when the catalog file is older than `max_age_days`
///
/// Refreshing the file is left to whoever maintains the catalog.
pub fn warn_if_stale(path: impl AsRef<Path>, max_age_days: f64) -> bool {
    let path = path.as_ref();
    match file_age_days(path) {
        Some(age) if age > max_age_days => {
            log::warn!(
                "Element catalog {:?} is {:.1} days old (limit {:.1}); positions may drift",
                path,
                age,
                max_age_days
            );
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const STATIONS: &str = "\
ISS (ZARYA)
1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927
2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537
0 SECOND
1 25545U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2928
2 25545  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563538
1 25546U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2929
2 25546  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563539
";

    #[test]
    fn test_parse_titles_and_bare_sets() {
        let catalog = ElementCatalog::parse(STATIONS).unwrap();
        let names: Vec<&str> = catalog.sets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["ISS (ZARYA)", "SECOND", "NORAD 25546"]);
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let text = format!("{}{}", STATIONS, STATIONS);
        let catalog = ElementCatalog::parse(&text).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("SECOND").unwrap().catalog_number(), Some(25545));
    }

    #[test]
    fn test_line1_without_line2_is_rejected() {
        let text = "BROKEN\n1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927\n";
        assert!(ElementCatalog::parse(text).is_err());
    }

    #[test]
    fn test_tracked_objects_keep_catalog_order() {
        let catalog = ElementCatalog::parse(STATIONS).unwrap();
        let names = vec!["NORAD 25546".to_string(), "ISS (ZARYA)".to_string()];
        let objects = catalog.tracked_objects(&names);
        let ids: Vec<&str> = objects.iter().map(|o| o.name()).collect();
        assert_eq!(ids, vec!["ISS (ZARYA)", "NORAD 25546"]);

        assert_eq!(catalog.tracked_objects(&[]).len(), 3);
    }

    #[test]
    fn test_load_gzipped_catalog() {
        let path = std::env::temp_dir().join(format!("satmap-test-{}.tle.gz", std::process::id()));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(STATIONS.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(!warn_if_stale(&path, 3.0));

        std::fs::remove_file(&path).ok();
    }
}
