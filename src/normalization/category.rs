//! Category and listing-type bucketing from free-text labels.
//!
//! Buckets are decided by ordered keyword containment over Arabic + English
//! lists. The order is fixed: villa, then land, then commercial; anything
//! else with a non-empty label falls back to apartment. The lists are kept
//! exclusive — "دوبلكس" shows up in both villa and apartment contexts in the
//! source data and is assigned to the apartment list only.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryBucket {
    Apartment,
    Villa,
    Land,
    Commercial,
    Other,
}

impl CategoryBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryBucket::Apartment => "apartment",
            CategoryBucket::Villa => "villa",
            CategoryBucket::Land => "land",
            CategoryBucket::Commercial => "commercial",
            CategoryBucket::Other => "other",
        }
    }

    /// Canonical Arabic label, matching the seeded `categories` rows.
    pub fn label_ar(&self) -> &'static str {
        match self {
            CategoryBucket::Apartment => "شقة",
            CategoryBucket::Villa => "فيلا",
            CategoryBucket::Land => "أرض",
            CategoryBucket::Commercial => "تجاري",
            CategoryBucket::Other => "أخرى",
        }
    }
}

/// Keyword lists per bucket; part of `MigrationConfig` so a corpus with
/// different vocabulary is a configuration change, not a code fork.
#[derive(Debug, Clone)]
pub struct CategoryKeywords {
    pub villa: &'static [&'static str],
    pub land: &'static [&'static str],
    pub commercial: &'static [&'static str],
}

pub const VILLA_KEYWORDS: &[&str] = &[
    "فيلا",
    "فله",
    "فيلل",
    "قصر",
    "تاون هاوس",
    "توين هاوس",
    "villa",
    "town house",
    "townhouse",
    "twin house",
];

pub const LAND_KEYWORDS: &[&str] = &["أرض", "ارض", "اراضي", "قطعة", "land", "plot"];

pub const COMMERCIAL_KEYWORDS: &[&str] = &[
    "محل",
    "تجاري",
    "مكتب",
    "اداري",
    "إداري",
    "عيادة",
    "مخزن",
    "صيدلية",
    "commercial",
    "shop",
    "office",
    "clinic",
];

impl Default for CategoryKeywords {
    fn default() -> Self {
        Self {
            villa: VILLA_KEYWORDS,
            land: LAND_KEYWORDS,
            commercial: COMMERCIAL_KEYWORDS,
        }
    }
}

impl CategoryKeywords {
    /// Ordered containment tests: villa -> land -> commercial -> apartment
    /// fallback. Absent/blank labels bucket as Other.
    pub fn bucket(&self, raw: Option<&str>) -> CategoryBucket {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return CategoryBucket::Other;
        };
        let lowered = raw.to_lowercase();
        if contains_any(&lowered, self.villa) {
            CategoryBucket::Villa
        } else if contains_any(&lowered, self.land) {
            CategoryBucket::Land
        } else if contains_any(&lowered, self.commercial) {
            CategoryBucket::Commercial
        } else {
            CategoryBucket::Apartment
        }
    }
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| haystack.contains(kw))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Sale,
    Rent,
}

impl ListingKind {
    pub fn label_ar(&self) -> &'static str {
        match self {
            ListingKind::Sale => "بيع",
            ListingKind::Rent => "إيجار",
        }
    }
}

/// Single keyword check: rent markers win, everything else is a sale.
pub fn bucket_listing_kind(text: &str) -> ListingKind {
    let lowered = text.to_lowercase();
    if lowered.contains("إيجار") || lowered.contains("ايجار") || lowered.contains("rent") {
        ListingKind::Rent
    } else {
        ListingKind::Sale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn villa_keyword_buckets_as_villa() {
        let kw = CategoryKeywords::default();
        assert_eq!(kw.bucket(Some("فيلا مستقلة للبيع")), CategoryBucket::Villa);
        assert_eq!(kw.bucket(Some("Twin House")), CategoryBucket::Villa);
    }

    #[test]
    fn tie_break_order_is_villa_land_commercial() {
        let kw = CategoryKeywords::default();
        // contains both villa and land keywords; villa is checked first
        assert_eq!(kw.bucket(Some("أرض فيلا")), CategoryBucket::Villa);
        assert_eq!(kw.bucket(Some("قطعة أرض")), CategoryBucket::Land);
        assert_eq!(kw.bucket(Some("محل تجاري")), CategoryBucket::Commercial);
    }

    #[test]
    fn unmatched_label_falls_back_to_apartment() {
        let kw = CategoryKeywords::default();
        assert_eq!(kw.bucket(Some("دوبلكس")), CategoryBucket::Apartment);
        assert_eq!(kw.bucket(Some("روف")), CategoryBucket::Apartment);
    }

    #[test]
    fn absent_label_buckets_as_other() {
        let kw = CategoryKeywords::default();
        assert_eq!(kw.bucket(None), CategoryBucket::Other);
        assert_eq!(kw.bucket(Some("   ")), CategoryBucket::Other);
    }

    #[test]
    fn keyword_lists_are_exclusive() {
        for kw in VILLA_KEYWORDS {
            assert!(!LAND_KEYWORDS.contains(kw));
            assert!(!COMMERCIAL_KEYWORDS.contains(kw));
        }
        for kw in LAND_KEYWORDS {
            assert!(!COMMERCIAL_KEYWORDS.contains(kw));
        }
    }

    #[test]
    fn rent_marker_wins_else_sale() {
        assert_eq!(bucket_listing_kind("شقة إيجار جديد"), ListingKind::Rent);
        assert_eq!(bucket_listing_kind("for rent"), ListingKind::Rent);
        assert_eq!(bucket_listing_kind("شقة للبيع"), ListingKind::Sale);
    }
}
