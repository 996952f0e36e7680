/// Estimates how many guests one unit of a room configuration sleeps
pub trait CapacityEstimator {
    /// Always at least 1
    fn estimate(&self, room_name: &str, bed_descriptors: &[String]) -> u32;
}

/// Keyword heuristic over the Russian room names and bed descriptions the
/// site returns.
///
/// The bed descriptors win when they say anything; otherwise the room name
/// decides. Unknown rooms sleep one.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordCapacityEstimator;

const NAME_KEYWORDS: &[(&str, u32)] = &[
    ("одноместн", 1),
    ("двухместн", 2),
    ("трехместн", 3),
    ("трёхместн", 3),
    ("четырехместн", 4),
    ("четырёхместн", 4),
    ("семейн", 3),
];

const BED_KEYWORDS: &[(&[&str], u32)] = &[
    (&["семейн"], 3),
    (&["двуспальн"], 2),
    (&["2 отдельные кровати", "две отдельные кровати"], 2),
    (&["диван"], 1),
];

impl CapacityEstimator for KeywordCapacityEstimator {
    fn estimate(&self, room_name: &str, bed_descriptors: &[String]) -> u32 {
        let name = room_name.to_lowercase();
        let by_name = NAME_KEYWORDS
            .iter()
            .filter(|(keyword, _)| name.contains(keyword))
            .map(|(_, guests)| *guests)
            .max()
            .unwrap_or(0);

        let by_beds: u32 = bed_descriptors
            .iter()
            .map(|bed| {
                let bed = bed.to_lowercase();
                BED_KEYWORDS
                    .iter()
                    .filter(|(keywords, _)| keywords.iter().any(|k| bed.contains(k)))
                    .map(|(_, guests)| *guests)
                    .sum::<u32>()
            })
            .sum();

        let capacity = if by_beds > 0 { by_beds } else { by_name };
        capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beds(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn name_keywords_take_the_largest() {
        let e = KeywordCapacityEstimator;
        assert_eq!(e.estimate("Одноместный номер", &[]), 1);
        assert_eq!(e.estimate("Стандарт Двухместный", &[]), 2);
        assert_eq!(e.estimate("Трёхместный люкс", &[]), 3);
        assert_eq!(e.estimate("Семейный четырехместный", &[]), 4);
    }

    #[test]
    fn beds_override_name() {
        let e = KeywordCapacityEstimator;
        assert_eq!(
            e.estimate("Одноместный", &beds(&["Двуспальная кровать", "Диван-кровать"])),
            3
        );
        assert_eq!(e.estimate("Номер", &beds(&["2 отдельные кровати"])), 2);
    }

    #[test]
    fn unknown_room_sleeps_one() {
        let e = KeywordCapacityEstimator;
        assert_eq!(e.estimate("", &[]), 1);
        assert_eq!(e.estimate("Studio", &beds(&["queen bed"])), 1);
    }
}
