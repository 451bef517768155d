//! The ascension ritual: the player buys a place in the pantheon by taking
//! over the seat of the weakest god.
use log::info;
use serde::{Deserialize, Serialize};

use crate::economy::PlayerEconomyState;
use crate::error::PantheonError;
use crate::ledger::InfluenceLedger;
use crate::numbers::non_negative;
use crate::pantheon::{Entity, EntityId, Pantheon};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AscensionRequest {
    pub id: EntityId,
    pub name: String,
    pub epithet: String,
}

impl AscensionRequest {
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        name: impl Into<String>,
        epithet: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            epithet: epithet.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AscensionOutcome {
    pub replaced: EntityId,
    pub ascended: EntityId,
    /// Influence inherited from the replaced god.
    pub influence: f64,
    pub cost: f64,
}

/// Perform the ritual and return the new roster.
///
/// Every check runs before anything is mutated.
///
/// # Errors
///
/// Rejects a second ascension, a balance below `cost`, an id already in use,
/// and an empty roster.
pub fn ascend(
    request: &AscensionRequest,
    pantheon: &Pantheon,
    ledger: &mut InfluenceLedger,
    economy: &mut PlayerEconomyState,
    cost: f64,
) -> Result<(Pantheon, AscensionOutcome), PantheonError> {
    if economy.ascended {
        return Err(PantheonError::AlreadyAscended);
    }
    let cost = non_negative(cost);
    if economy.balance < cost {
        return Err(PantheonError::InsufficientBalance {
            cost,
            balance: economy.balance,
        });
    }
    if pantheon.contains(request.id.as_str()) || ledger.contains(request.id.as_str()) {
        return Err(PantheonError::EntityIdTaken(request.id.clone()));
    }
    let Some(weakest) = pantheon.weakest_starting() else {
        return Err(PantheonError::NoRival);
    };
    let replaced = weakest.id.clone();
    if !ledger.contains(replaced.as_str()) {
        return Err(PantheonError::UnknownEntity(replaced));
    }

    let influence = ledger.rename(replaced.as_str(), request.id.clone())?;
    let risen = Entity::ascended(request.id.clone(), &request.name, &request.epithet);
    let roster = pantheon.with_replacement(replaced.as_str(), risen);
    economy.remap_entity(replaced.as_str(), &request.id);
    economy.balance -= cost;
    economy.ascended = true;
    info!(
        "{} ascends in place of {replaced} with {influence:.2} influence",
        request.name
    );
    Ok((
        roster,
        AscensionOutcome {
            replaced,
            ascended: request.id.clone(),
            influence,
            cost,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AscensionRequest {
        AscensionRequest::new("vel", "Vel", "the Risen")
    }

    #[test]
    fn ascension_takes_weakest_seat() {
        let pantheon = Pantheon::standard();
        let mut ledger = InfluenceLedger::from_pantheon(&pantheon);
        let mut economy = PlayerEconomyState::new(12_000.0);
        economy.patron = Some("mercurio".into());
        let (roster, outcome) =
            ascend(&request(), &pantheon, &mut ledger, &mut economy, 10_000.0).unwrap();
        assert_eq!(outcome.replaced, EntityId::from("mercurio"));
        assert!((outcome.influence - 80.0).abs() < f64::EPSILON);
        assert!((ledger.get("vel").unwrap() - 80.0).abs() < f64::EPSILON);
        assert!(!ledger.contains("mercurio"));
        assert!(roster.contains("vel") && !roster.contains("mercurio"));
        assert_eq!(economy.patron, Some(EntityId::from("vel")));
        assert!((economy.balance - 2_000.0).abs() < f64::EPSILON);
        assert!(economy.ascended);
    }

    #[test]
    fn ascension_is_one_time() {
        let pantheon = Pantheon::standard();
        let mut ledger = InfluenceLedger::from_pantheon(&pantheon);
        let mut economy = PlayerEconomyState::new(30_000.0);
        let (roster, _) =
            ascend(&request(), &pantheon, &mut ledger, &mut economy, 10_000.0).unwrap();
        let again = AscensionRequest::new("zed", "Zed", "the Second");
        assert_eq!(
            ascend(&again, &roster, &mut ledger, &mut economy, 10_000.0),
            Err(PantheonError::AlreadyAscended)
        );
    }

    #[test]
    fn rejections_leave_state_untouched() {
        let pantheon = Pantheon::standard();
        let mut ledger = InfluenceLedger::from_pantheon(&pantheon);
        let mut economy = PlayerEconomyState::new(9_999.0);
        let before = (ledger.clone(), economy.clone());
        assert!(matches!(
            ascend(&request(), &pantheon, &mut ledger, &mut economy, 10_000.0),
            Err(PantheonError::InsufficientBalance { .. })
        ));
        economy.balance = 20_000.0;
        let taken = AscensionRequest::new("solara", "Sol", "the Usurper");
        assert_eq!(
            ascend(&taken, &pantheon, &mut ledger, &mut economy, 10_000.0),
            Err(PantheonError::EntityIdTaken("solara".into()))
        );
        assert_eq!(ledger, before.0);
        assert!(!economy.ascended);
    }
}
