//! City identity, equivalence and display-list reconciliation.
//!
//! Two notions of "sameness" live here and must not be confused:
//! - [`identity_key`] is an exact key used for maps and the weather cache.
//! - [`is_same_city`] is a lenient equivalence used to drop duplicates
//!   from the display list: names equal (case-insensitive) OR both axes
//!   within [`NEARBY_DEGREES`].
//!
//! The name branch matches same-named places anywhere in the world. That is
//! coarse, but it is what keeps reverse-geocoded current locations from
//! showing up twice next to the saved entry they correspond to.

use crate::model::{City, CityId};

/// Equivalence radius on each axis, in degrees.
pub const NEARBY_DEGREES: f64 = 0.01;

const KEY_PRECISION: f64 = 10_000.0;

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn rounded(value: f64) -> String {
    let r = (value * KEY_PRECISION).round() / KEY_PRECISION;
    // avoid "-0.0000" and "0.0000" producing different keys
    let r = if r == 0.0 { 0.0 } else { r };
    format!("{r:.4}")
}

/// `current_<name>` for the current location, `<name>_<lat>_<lon>` otherwise,
/// with coordinates rounded to four decimals.
pub fn identity_key(city: &City) -> CityId {
    let name = normalize_name(&city.name);
    if city.is_current {
        CityId::from(format!("current_{name}"))
    } else {
        CityId::from(format!(
            "{name}_{}_{}",
            rounded(city.latitude),
            rounded(city.longitude)
        ))
    }
}

pub fn is_same_city(a: &City, b: &City) -> bool {
    normalize_name(&a.name) == normalize_name(&b.name) || a.coordinates().is_near(&b.coordinates())
}

/// Ordered display list: the current city first, followed by every saved
/// city that is not equivalent to it. Storage is never touched.
pub fn reconcile(current: Option<&City>, saved: &[City]) -> Vec<City> {
    match current {
        None => saved.to_vec(),
        Some(current) => std::iter::once(current.clone())
            .chain(saved.iter().filter(|c| !is_same_city(current, c)).cloned())
            .collect(),
    }
}
