use crate::error::TrackerError;
use crate::types::*;

/// Remaining stocks summed over a side's seats. Missing frame data counts as zero.
pub fn side_stocks(start: &MatchStartInfo, frame: Option<&FrameSnapshot>, seats: &[usize]) -> u32 {
    let Some(frame) = frame else {
        return 0;
    };
    seats
        .iter()
        .filter_map(|&seat| start.participants.get(seat))
        .map(|p| frame.stocks_for_port(p.port))
        .sum()
}

pub fn determine_winner(
    start: &MatchStartInfo,
    end: &MatchEndInfo,
    frame: Option<&FrameSnapshot>,
    partition: &SidePartition,
) -> Outcome {
    let mine = side_stocks(start, frame, &partition.mine);
    let other = side_stocks(start, frame, &partition.other);

    match end.method {
        // Stock/percent tiebreak is left to the humans.
        EndMethod::TimeOut => Outcome::Unknown("match timed out"),
        EndMethod::StocksSingles | EndMethod::StocksTeams => {
            if mine == 0 && other == 0 {
                Outcome::Unknown("both sides at zero stocks")
            } else if mine == 0 {
                Outcome::Winner(Side::B)
            } else {
                Outcome::Winner(Side::A)
            }
        }
        // LRAS heuristic: whoever sits on their last stock probably quit out.
        EndMethod::SuddenQuit => match (mine == 1, other == 1) {
            (true, false) => Outcome::Winner(Side::B),
            (false, true) => Outcome::Winner(Side::A),
            _ => Outcome::Unknown("no single side on its last stock at quit-out"),
        },
        EndMethod::Other(_) => Outcome::Unknown("unrecognised end method"),
    }
}

/// Like [`determine_winner`], but rejects a partition that does not fit the match.
pub fn determine_winner_checked(
    start: &MatchStartInfo,
    end: &MatchEndInfo,
    frame: Option<&FrameSnapshot>,
    partition: &SidePartition,
) -> Result<Outcome, TrackerError> {
    for side in [Side::A, Side::B] {
        let seats = partition.seats(side);
        if seats.is_empty() {
            return Err(TrackerError::internal(format!("{side} has no participants")));
        }
        if let Some(seat) = seats.iter().find(|&&seat| seat >= start.participants.len()) {
            return Err(TrackerError::internal(format!("{side} seat {seat} out of range")));
        }
    }
    Ok(determine_winner(start, end, frame, partition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve_sides;
    use crate::test_support::{doubles, frame, singles};

    fn outcome(method: EndMethod, stocks: &[(u8, u8)]) -> Outcome {
        let start = singles("AAA", "BBB");
        let partition = resolve_sides(&start, "AAA").unwrap();
        let snapshot = frame(stocks);
        determine_winner(&start, &MatchEndInfo { method }, Some(&snapshot), &partition)
    }

    #[test]
    fn test_timeout_is_unknown() {
        assert!(matches!(outcome(EndMethod::TimeOut, &[(1, 4), (2, 1)]), Outcome::Unknown(_)));
        assert!(matches!(outcome(EndMethod::TimeOut, &[(1, 0), (2, 3)]), Outcome::Unknown(_)));
    }

    #[test]
    fn test_stocks_winner() {
        assert_eq!(outcome(EndMethod::StocksSingles, &[(1, 0), (2, 2)]), Outcome::Winner(Side::B));
        assert_eq!(outcome(EndMethod::StocksSingles, &[(1, 3), (2, 0)]), Outcome::Winner(Side::A));
    }

    #[test]
    fn test_stocks_both_zero_is_unknown() {
        let both_out = outcome(EndMethod::StocksSingles, &[(1, 0), (2, 0)]);
        assert!(matches!(both_out, Outcome::Unknown(_)));
        assert!(matches!(outcome(EndMethod::StocksTeams, &[]), Outcome::Unknown(_)));
    }

    #[test]
    fn test_sudden_quit_heuristic() {
        assert_eq!(outcome(EndMethod::SuddenQuit, &[(1, 1), (2, 3)]), Outcome::Winner(Side::B));
        assert_eq!(outcome(EndMethod::SuddenQuit, &[(1, 2), (2, 1)]), Outcome::Winner(Side::A));
        assert!(matches!(outcome(EndMethod::SuddenQuit, &[(1, 1), (2, 1)]), Outcome::Unknown(_)));
        assert!(matches!(outcome(EndMethod::SuddenQuit, &[(1, 4), (2, 2)]), Outcome::Unknown(_)));
    }

    #[test]
    fn test_unknown_end_method() {
        assert!(matches!(outcome(EndMethod::Other(0), &[(1, 0), (2, 2)]), Outcome::Unknown(_)));
    }

    #[test]
    fn test_missing_frame_counts_as_zero() {
        let start = singles("AAA", "BBB");
        let partition = resolve_sides(&start, "AAA").unwrap();
        let end = MatchEndInfo { method: EndMethod::StocksSingles };
        assert!(matches!(determine_winner(&start, &end, None, &partition), Outcome::Unknown(_)));
        // Only the opponent's port has data; ours reads as zero.
        let snapshot = frame(&[(2, 1)]);
        let outcome = determine_winner(&start, &end, Some(&snapshot), &partition);
        assert_eq!(outcome, Outcome::Winner(Side::B));
    }

    #[test]
    fn test_team_stocks_sum_per_member() {
        let start = doubles();
        let partition = resolve_sides(&start, "AAA#1").unwrap();
        // AAA#1 (port 1) and CCC#3 (port 3) are team 0.
        let snapshot = frame(&[(1, 0), (2, 0), (3, 1), (4, 0)]);
        let end = MatchEndInfo { method: EndMethod::StocksTeams };
        assert_eq!(side_stocks(&start, Some(&snapshot), &partition.mine), 1);
        let outcome = determine_winner(&start, &end, Some(&snapshot), &partition);
        assert_eq!(outcome, Outcome::Winner(Side::A));

        let quit = MatchEndInfo { method: EndMethod::SuddenQuit };
        let snapshot = frame(&[(1, 1), (2, 2), (3, 0), (4, 1)]);
        let outcome = determine_winner(&start, &quit, Some(&snapshot), &partition);
        assert_eq!(outcome, Outcome::Winner(Side::B));
    }

    #[test]
    fn test_checked_rejects_bad_partition() {
        let start = singles("AAA", "BBB");
        let end = MatchEndInfo { method: EndMethod::StocksSingles };
        let snapshot = frame(&[(1, 2), (2, 0)]);
        let empty = SidePartition { local_seat: 0, mine: vec![0], other: vec![] };
        assert!(determine_winner_checked(&start, &end, Some(&snapshot), &empty).is_err());
        let stale = SidePartition { local_seat: 0, mine: vec![0], other: vec![3] };
        assert!(determine_winner_checked(&start, &end, Some(&snapshot), &stale).is_err());
        let good = resolve_sides(&start, "AAA").unwrap();
        let outcome = determine_winner_checked(&start, &end, Some(&snapshot), &good).unwrap();
        assert_eq!(outcome, Outcome::Winner(Side::A));
    }
}
