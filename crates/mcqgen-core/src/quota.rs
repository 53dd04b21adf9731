use crate::error::{Error, Result};

/// Split `total` across `topics` slots in caller order: every slot gets
/// `total / topics`, and the first `total % topics` slots get one more.
pub fn allocate(total: usize, topics: usize) -> Result<Vec<usize>> {
    if total < 1 {
        return Err(Error::AllocationViolation("num_questions must be at least 1".into()));
    }
    if topics == 0 {
        return Err(Error::AllocationViolation("at least one topic is required".into()));
    }
    let base = total / topics;
    let remainder = total % topics;
    Ok((0..topics).map(|i| base + usize::from(i < remainder)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_goes_to_leading_topics() {
        assert_eq!(allocate(10, 3).unwrap(), vec![4, 3, 3]);
        assert_eq!(allocate(11, 3).unwrap(), vec![4, 4, 3]);
        assert_eq!(allocate(2, 4).unwrap(), vec![1, 1, 0, 0]);
    }

    #[test]
    fn allocation_always_sums_to_total() {
        for total in 1..60 {
            for topics in 1..9 {
                let counts = allocate(total, topics).unwrap();
                let base = total / topics;
                assert_eq!(counts.len(), topics);
                assert_eq!(counts.iter().sum::<usize>(), total);
                assert!(counts.iter().all(|&c| c == base || c == base + 1));
            }
        }
    }

    #[test]
    fn zero_questions_or_topics_is_a_violation() {
        assert!(matches!(allocate(0, 3), Err(Error::AllocationViolation(_))));
        assert!(matches!(allocate(5, 0), Err(Error::AllocationViolation(_))));
    }
}
