//! Priority scoring

use crate::models::PriorityScore;

/// Issue categories a citizen can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Pothole,
    GarbageDisposal,
    StreetLight,
    WaterLeakage,
    Graffiti,
    Other,
}

/// Priority labels older clients send in place of a category name.
const PRIORITY_LABELS: &[(&str, u8)] = &[
    ("High Priority", 4),
    ("Moderate Priority", 3),
    ("Low Priority", 2),
];

/// Location keywords that raise urgency by one step.
const SENSITIVE_SITES: &[&str] = &[
    "school",
    "hospital",
    "clinic",
    "intersection",
    "highway",
    "main road",
    "bridge",
    "station",
];

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Pothole,
        Category::GarbageDisposal,
        Category::StreetLight,
        Category::WaterLeakage,
        Category::Graffiti,
        Category::Other,
    ];

    /// Look up a category by display name, ignoring case, spaces and underscores.
    pub fn from_name(name: &str) -> Option<Self> {
        let key = name_key(name);
        Self::ALL
            .into_iter()
            .find(|category| name_key(category.display_name()) == key)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Pothole => "Pothole",
            Category::GarbageDisposal => "Garbage Disposal",
            Category::StreetLight => "Street Light",
            Category::WaterLeakage => "Water Leakage",
            Category::Graffiti => "Graffiti",
            Category::Other => "Other",
        }
    }

    fn base_urgency(&self) -> u8 {
        match self {
            Category::Pothole | Category::StreetLight => 4,
            Category::WaterLeakage | Category::GarbageDisposal => 3,
            Category::Graffiti => 2,
            Category::Other => 1,
        }
    }
}

fn name_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Base urgency for a category name or a priority label, `None` if neither.
pub fn base_urgency(name: &str) -> Option<u8> {
    if let Some(category) = Category::from_name(name) {
        return Some(category.base_urgency());
    }
    let key = name_key(name);
    PRIORITY_LABELS
        .iter()
        .find(|(label, _)| name_key(label) == key)
        .map(|(_, urgency)| *urgency)
}

/// Whether a submission may use this name as its category.
pub fn is_known_category(name: &str) -> bool {
    base_urgency(name).is_some()
}

/// Score a new complaint. Unrecognized categories land in the lowest bucket.
pub fn score(category: &str, location: &str, has_photo: bool) -> PriorityScore {
    let base = base_urgency(category).unwrap_or(Category::Other.base_urgency()) as i8;

    let location_lower = location.to_lowercase();
    let site_boost = if SENSITIVE_SITES
        .iter()
        .any(|site| location_lower.contains(site))
    {
        1
    } else {
        0
    };
    let photo_penalty = if has_photo { 0 } else { 1 };

    let urgency = (base + site_boost - photo_penalty).clamp(1, 5) as u8;

    PriorityScore {
        urgency,
        category: category.to_string(),
        location: location.to_string(),
        photo: has_photo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_lookup_is_lenient() {
        assert_eq!(Category::from_name("Pothole"), Some(Category::Pothole));
        assert_eq!(
            Category::from_name("street_light"),
            Some(Category::StreetLight)
        );
        assert_eq!(
            Category::from_name("WATER LEAKAGE"),
            Some(Category::WaterLeakage)
        );
        assert_eq!(Category::from_name("High Priority"), None);
    }

    #[test]
    fn test_priority_labels_are_known() {
        assert_eq!(base_urgency("High Priority"), Some(4));
        assert_eq!(base_urgency("moderate priority"), Some(3));
        assert_eq!(base_urgency("Low_Priority"), Some(2));
        assert_eq!(base_urgency("Urgent Priority"), None);
        assert!(is_known_category("Street Light"));
        assert!(!is_known_category("Alien landing"));
    }

    #[test]
    fn test_priority_label_scores() {
        assert_eq!(score("High Priority", "Elm Street", true).urgency, 4);
        assert_eq!(score("Moderate Priority", "Elm Street", true).urgency, 3);
        assert_eq!(score("Low Priority", "Elm Street", true).urgency, 2);
        assert_eq!(score("High Priority", "Near the hospital", true).urgency, 5);
        assert_eq!(score("Low Priority", "Elm Street", false).urgency, 1);
    }

    #[test]
    fn test_base_scores() {
        assert_eq!(score("Pothole", "Elm Street", true).urgency, 4);
        assert_eq!(score("Garbage Disposal", "Elm Street", true).urgency, 3);
        assert_eq!(score("Graffiti", "Elm Street", true).urgency, 2);
        assert_eq!(score("Other", "Elm Street", true).urgency, 1);
    }

    #[test]
    fn test_unknown_category_is_lowest_bucket() {
        assert_eq!(score("Alien landing", "Elm Street", true).urgency, 1);
    }

    #[test]
    fn test_sensitive_location_boost() {
        assert_eq!(score("Pothole", "Outside Lincoln School", true).urgency, 5);
        assert_eq!(score("Graffiti", "Central Station underpass", true).urgency, 3);
    }

    #[test]
    fn test_missing_photo_lowers_urgency() {
        assert_eq!(score("Water Leakage", "Elm Street", false).urgency, 2);
    }

    #[test]
    fn test_urgency_always_within_bounds() {
        let locations = ["", "hospital intersection by the bridge", "Elm Street"];
        for category in Category::ALL {
            for location in locations {
                for photo in [true, false] {
                    let urgency = score(category.display_name(), location, photo).urgency;
                    assert!((1..=5).contains(&urgency), "{urgency} out of range");
                }
            }
        }
        assert_eq!(score("Other", "Elm Street", false).urgency, 1);
        assert_eq!(score("Pothole", "Hospital road", true).urgency, 5);
    }

    #[test]
    fn test_score_echoes_inputs() {
        let result = score("Pothole", "Main Street", true);
        assert_eq!(result.category, "Pothole");
        assert_eq!(result.location, "Main Street");
        assert!(result.photo);
    }
}
