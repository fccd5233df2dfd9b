//! Longitude/latitude column detection

/// Candidate (longitude, latitude) name pairs, in priority order
const LON_LAT_PAIRS: &[(&str, &str)] = &[("ra", "dec"), ("lon", "lat"), ("lng", "lat")];

/// Pick the longitude and latitude columns of a table
///
/// For each candidate pair, an exact (case-insensitive) match is tried
/// first, then a prefix match. A pair is accepted only when both names match
/// exactly one column; otherwise the guess is `(None, None)`. Names that
/// merely contain `ra` or `lat` (`pm_ra`, `dlat`) are never considered.
pub fn guess_lon_lat_columns<S: AsRef<str>>(names: &[S]) -> (Option<String>, Option<String>) {
    let lower: Vec<String> = names.iter().map(|n| n.as_ref().to_lowercase()).collect();

    let unique = |matches: &dyn Fn(&str) -> bool| -> Option<usize> {
        let mut found = lower.iter().enumerate().filter(|(_, n)| matches(n.as_str()));
        match (found.next(), found.next()) {
            (Some((index, _)), None) => Some(index),
            _ => None,
        }
    };

    for (lon, lat) in LON_LAT_PAIRS {
        let exact = (unique(&|n: &str| n == *lon), unique(&|n: &str| n == *lat));
        if let (Some(i), Some(j)) = exact {
            return (Some(names[i].as_ref().to_string()), Some(names[j].as_ref().to_string()));
        }

        let prefix =
            (unique(&|n: &str| n.starts_with(*lon)), unique(&|n: &str| n.starts_with(*lat)));
        if let (Some(i), Some(j)) = prefix {
            return (Some(names[i].as_ref().to_string()), Some(names[j].as_ref().to_string()));
        }
    }

    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pair(lon: &str, lat: &str) -> (Option<String>, Option<String>) {
        (Some(lon.to_string()), Some(lat.to_string()))
    }

    #[rstest]
    #[case(&["flux", "dec", "ra"], pair("ra", "dec"))]
    #[case(&["RA", "Dec", "mag"], pair("RA", "Dec"))]
    #[case(&["flux", "lon", "lat"], pair("lon", "lat"))]
    #[case(&["lng", "lat"], pair("lng", "lat"))]
    #[case(&["ra_j2000", "dec_j2000", "pm_ra"], pair("ra_j2000", "dec_j2000"))]
    #[case(&["flux", "lng2", "lat2", "lng1", "lat1"], (None, None))]
    #[case(&["pm_ra", "pm_dec"], (None, None))]
    #[case(&["x", "y"], (None, None))]
    fn test_guess(#[case] names: &[&str], #[case] expected: (Option<String>, Option<String>)) {
        assert_eq!(guess_lon_lat_columns(names), expected);
    }

    #[test]
    fn test_exact_match_beats_prefix() {
        let names = ["ra", "ra_err", "dec", "dec_err"];
        assert_eq!(guess_lon_lat_columns(&names), pair("ra", "dec"));
    }
}
