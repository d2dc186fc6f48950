use std::cmp::Ordering;

use crate::db::{Paged, Pagination};

/// Page count is computed from the full result set before the offset is
/// applied, so every page of the same query reports the same total.
pub(crate) fn paginate<T>(records: Vec<T>, pagination: Pagination) -> Paged<T> {
    let limit = pagination
        .limit
        .and_then(|l| usize::try_from(l).ok())
        .filter(|l| *l > 0);
    let offset = pagination
        .offset
        .and_then(|o| usize::try_from(o).ok())
        .unwrap_or(0);

    let n_pages = limit.map_or(1, |l| records.len().div_ceil(l));

    let skipped = records.into_iter().skip(offset);
    let records = match limit {
        Some(l) => skipped.take(l).collect(),
        None => skipped.collect(),
    };

    Paged { records, n_pages }
}

/// difflib-style ratio between two names, case-insensitive.
pub(crate) fn similarity(a: &str, b: &str) -> f32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    similar::TextDiff::from_chars(a.as_str(), b.as_str()).ratio()
}

/// Orders `items` by descending name similarity to `word`, truncating to
/// `limit` when given. Ties keep their original relative order.
pub(crate) fn rank_by_similarity<T>(
    mut items: Vec<T>,
    word: &str,
    name: impl Fn(&T) -> &str,
    limit: Option<usize>,
) -> Vec<T> {
    items.sort_by(|x, y| {
        similarity(name(y), word)
            .partial_cmp(&similarity(name(x), word))
            .unwrap_or(Ordering::Equal)
    });

    if let Some(limit) = limit {
        items.truncate(limit);
    }

    items
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn page_count_is_independent_of_offset() {
        let rows: Vec<i32> = (0..45).collect();

        for offset in [None, Some(15), Some(30)] {
            let paged = paginate(
                rows.clone(),
                Pagination {
                    limit: Some(20),
                    offset,
                },
            );
            assert_eq!(paged.n_pages, 3);
        }

        let paged = paginate(
            rows,
            Pagination {
                limit: Some(20),
                offset: Some(40),
            },
        );
        assert_eq!(paged.records, (40..45).collect::<Vec<_>>());
    }

    #[test]
    fn no_limit_is_one_page() {
        let paged = paginate((0..7).collect::<Vec<_>>(), Pagination::default());
        assert_eq!(paged.n_pages, 1);
        assert_eq!(paged.records.len(), 7);
    }

    #[test]
    fn similarity_ranks_closest_first() {
        let names = vec!["brain organoid", "liver biopsy", "brain orgnoid rep2"];
        let ranked = rank_by_similarity(names, "brain organoid", |n| *n, Some(2));

        assert_eq!(ranked[0], "brain organoid");
        assert_eq!(ranked[1], "brain orgnoid rep2");
    }
}
