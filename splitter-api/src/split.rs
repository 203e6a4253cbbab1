//! Expense split arithmetic: a group total and the even share per member.

/// Sum of all contributions.
pub fn total(amounts: &[f64]) -> f64 {
    amounts.iter().sum()
}

/// Even share of `total` across `members`; zero members yields 0.0 instead of dividing by zero.
pub fn per_member_share(total: f64, members: usize) -> f64 {
    if members == 0 { 0.0 } else { total / members as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_and_splits_evenly() {
        let t = total(&[10.0, 20.0, 30.0]);
        assert_eq!(t, 60.0);
        assert_eq!(per_member_share(t, 3), 20.0);
    }

    #[test]
    fn empty_group_has_zero_share() {
        assert_eq!(total(&[]), 0.0);
        assert_eq!(per_member_share(0.0, 0), 0.0);
        assert_eq!(per_member_share(42.0, 0), 0.0);
    }

    #[test]
    fn uneven_split_is_fractional() {
        assert!((per_member_share(total(&[10.0, 0.0, 0.0]), 3) - 3.333_333).abs() < 1e-5);
    }
}
