use crate::config::normalize_slippi_code;
use crate::error::TrackerError;
use crate::replay::character_label_parts;
use crate::scoreboard::ScoreboardRecord;
use crate::types::*;

/// Index of the participant whose code matches `my_code`, or seat 0.
pub fn local_seat(start: &MatchStartInfo, my_code: &str) -> usize {
    let Some(mine) = normalize_slippi_code(my_code) else {
        return 0;
    };
    start
        .participants
        .iter()
        .position(|p| normalize_slippi_code(&p.code).as_deref() == Some(mine.as_str()))
        .unwrap_or(0)
}

pub fn resolve_sides(start: &MatchStartInfo, my_code: &str) -> Result<SidePartition, TrackerError> {
    let participants = &start.participants;
    let local = local_seat(start, my_code);
    match participants.len() {
        2 => Ok(SidePartition {
            local_seat: local,
            mine: vec![local],
            other: vec![1 - local],
        }),
        4 => {
            let Some(my_team) = participants[local].team else {
                return Err(TrackerError::internal(format!(
                    "four-player match without team data (port {})",
                    participants[local].port
                )));
            };
            let (mine, other): (Vec<usize>, Vec<usize>) =
                (0..participants.len()).partition(|&seat| participants[seat].team == Some(my_team));
            if other.is_empty() {
                return Err(TrackerError::internal("every participant is on the same team"));
            }
            Ok(SidePartition { local_seat: local, mine, other })
        }
        n => Err(TrackerError::internal(format!("unsupported participant count {n}"))),
    }
}

fn members<'a>(
    start: &'a MatchStartInfo,
    seats: &[usize],
) -> Result<Vec<&'a MatchParticipant>, TrackerError> {
    seats
        .iter()
        .map(|&seat| {
            start
                .participants
                .get(seat)
                .ok_or_else(|| TrackerError::internal(format!("seat {seat} out of range")))
        })
        .collect()
}

/// Member codes sorted, so the same players always produce the same string.
pub fn side_fingerprint(members: &[&MatchParticipant]) -> String {
    let mut codes: Vec<&str> = members.iter().map(|p| p.code.as_str()).collect();
    codes.sort_unstable();
    codes.join(TEAM_DELIMITER)
}

pub fn participant_label(participant: &MatchParticipant) -> String {
    let parts = participant.character.as_ref().and_then(character_label_parts);
    match parts {
        Some((character, color)) => {
            [participant.display_name.as_str(), character, color].join(LABEL_SEGMENT_SEPARATOR)
        }
        None => participant.display_name.clone(),
    }
}

/// Labels follow the same member order as the fingerprint.
pub fn side_label(members: &[&MatchParticipant]) -> String {
    let mut sorted = members.to_vec();
    sorted.sort_by(|a, b| a.code.cmp(&b.code));
    sorted
        .iter()
        .map(|p| participant_label(p))
        .collect::<Vec<_>>()
        .join(TEAM_DELIMITER)
}

pub fn side_identity(
    start: &MatchStartInfo,
    partition: &SidePartition,
    side: Side,
) -> Result<SideIdentity, TrackerError> {
    let members = members(start, partition.seats(side))?;
    if members.is_empty() {
        return Err(TrackerError::internal(format!("{side} has no participants")));
    }
    Ok(SideIdentity {
        code: side_fingerprint(&members),
        label: side_label(&members),
    })
}

fn changed(stored: &SideFields, identity: &SideIdentity) -> bool {
    stored.code.as_deref() != Some(identity.code.as_str())
        || stored.name.as_deref() != Some(identity.label.as_str())
}

/// Compares the computed identities against the stored record.
pub fn decide_identity(
    start: &MatchStartInfo,
    partition: &SidePartition,
    record: &ScoreboardRecord,
) -> Result<IdentityUpdate, TrackerError> {
    let side_a = side_identity(start, partition, Side::A)?;
    let side_b = side_identity(start, partition, Side::B)?;

    let reset = record.side_a.code.as_deref() != Some(side_a.code.as_str())
        || record.side_b.code.as_deref() != Some(side_b.code.as_str());

    Ok(IdentityUpdate {
        reset,
        side_a: changed(&record.side_a, &side_a).then_some(side_a),
        side_b: changed(&record.side_b, &side_b).then_some(side_b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{doubles, participant, singles, team_participant};

    #[test]
    fn test_singles_local_seat_by_code() {
        let start = singles("AAA#1", "BBB#2");
        let partition = resolve_sides(&start, "bbb#2").unwrap();
        assert_eq!(partition.local_seat, 1);
        assert_eq!(partition.mine, vec![1]);
        assert_eq!(partition.other, vec![0]);
    }

    #[test]
    fn test_singles_fallback_to_seat_zero() {
        let start = singles("AAA#1", "BBB#2");
        for code in ["ZZZ#9", ""] {
            let partition = resolve_sides(&start, code).unwrap();
            assert_eq!(partition.mine, vec![0]);
            assert_eq!(partition.other, vec![1]);
        }
    }

    fn codes<'a>(start: &'a MatchStartInfo, seats: &[usize]) -> Vec<&'a str> {
        seats.iter().map(|&s| start.participants[s].code.as_str()).collect()
    }

    #[test]
    fn test_doubles_partition_by_team_any_order() {
        let players = [
            team_participant("AAA#1", 1, 0),
            team_participant("BBB#2", 2, 1),
            team_participant("CCC#3", 3, 0),
            team_participant("DDD#4", 4, 1),
        ];
        let orders: [[usize; 4]; 3] = [[0, 1, 2, 3], [3, 2, 1, 0], [1, 3, 0, 2]];
        for order in orders {
            let start = MatchStartInfo {
                participants: order.iter().map(|&i| players[i].clone()).collect(),
            };
            let partition = resolve_sides(&start, "CCC#3").unwrap();
            let mut mine = codes(&start, &partition.mine);
            let mut other = codes(&start, &partition.other);
            mine.sort();
            other.sort();
            assert_eq!(mine, vec!["AAA#1", "CCC#3"]);
            assert_eq!(other, vec!["BBB#2", "DDD#4"]);
        }
    }

    #[test]
    fn test_doubles_without_teams_is_error() {
        let start = MatchStartInfo {
            participants: (1..=4).map(|port| participant(&format!("P#{port}"), port)).collect(),
        };
        assert!(matches!(resolve_sides(&start, "P#1"), Err(TrackerError::Internal(_))));
    }

    #[test]
    fn test_unsupported_player_count() {
        let start = MatchStartInfo {
            participants: vec![participant("AAA#1", 1)],
        };
        assert!(resolve_sides(&start, "AAA#1").is_err());
    }

    #[test]
    fn test_fingerprint_order_independent() {
        let a = participant("AAA#1", 1);
        let b = participant("BBB#2", 2);
        assert_eq!(side_fingerprint(&[&a, &b]), side_fingerprint(&[&b, &a]));
        assert_eq!(side_fingerprint(&[&a, &b]), "AAA#1&&BBB#2");
        assert_eq!(side_fingerprint(&[&a]), "AAA#1");
        assert_eq!(side_label(&[&a, &b]), side_label(&[&b, &a]));
    }

    #[test]
    fn test_participant_label_with_character() {
        let mut p = participant("AAA#1", 1);
        p.display_name = "Mango".to_string();
        assert_eq!(participant_label(&p), "Mango");
        p.character = Some(CharacterSelection { character: 0x14, costume: 2 });
        assert_eq!(participant_label(&p), "Mango / Falco / Blue");
    }

    #[test]
    fn test_decide_identity_reset_on_new_opponent() {
        let start = singles("AAA", "BBB");
        let partition = resolve_sides(&start, "AAA").unwrap();
        let mut record = ScoreboardRecord::default();
        record.side_a.code = Some("AAA".to_string());
        record.side_a.name = Some(participant_label(&start.participants[0]));
        record.side_b.code = Some("CCC".to_string());

        let update = decide_identity(&start, &partition, &record).unwrap();
        assert!(update.reset);
        assert!(update.side_a.is_none());
        assert_eq!(update.side_b.unwrap().code, "BBB");
    }

    #[test]
    fn test_decide_identity_noop_when_unchanged() {
        let start = doubles();
        let partition = resolve_sides(&start, "AAA#1").unwrap();
        let a = side_identity(&start, &partition, Side::A).unwrap();
        let b = side_identity(&start, &partition, Side::B).unwrap();
        let mut record = ScoreboardRecord::default();
        record.side_a.code = Some(a.code);
        record.side_a.name = Some(a.label);
        record.side_b.code = Some(b.code);
        record.side_b.name = Some(b.label);

        let update = decide_identity(&start, &partition, &record).unwrap();
        assert!(update.is_noop());
    }

    #[test]
    fn test_decide_identity_label_only_change_does_not_reset() {
        let mut start = singles("AAA", "BBB");
        let partition = resolve_sides(&start, "AAA").unwrap();
        let mut record = ScoreboardRecord::default();
        record.side_a.code = Some("AAA".to_string());
        record.side_a.name = Some(participant_label(&start.participants[0]));
        record.side_b.code = Some("BBB".to_string());
        record.side_b.name = Some(participant_label(&start.participants[1]));

        start.participants[1].character = Some(CharacterSelection { character: 0x09, costume: 0 });
        let update = decide_identity(&start, &partition, &record).unwrap();
        assert!(!update.reset);
        assert!(update.side_a.is_none());
        assert_eq!(update.side_b.unwrap().label, "BBB / Marth / Default");
    }
}
