use std::collections::{BTreeSet, HashMap};

use tracing::warn;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentView, PetProfile, UserProfile};

/// Distinct pet ids and vet ids referenced by `records`, each sorted.
pub fn related_ids(records: &[Appointment]) -> (Vec<Uuid>, Vec<Uuid>) {
    let pets: BTreeSet<Uuid> = records.iter().map(|a| a.pet_id).collect();
    let vets: BTreeSet<Uuid> = records.iter().filter_map(|a| a.vet_id).collect();
    (pets.into_iter().collect(), vets.into_iter().collect())
}

/// Joins each record with its pet (owner + species) and vet (with role).
/// Record order is preserved. A dangling reference leaves the slot empty.
pub fn attach(
    records: Vec<Appointment>,
    pets: Vec<PetProfile>,
    vets: Vec<UserProfile>,
) -> Vec<AppointmentView> {
    let pets: HashMap<Uuid, PetProfile> = pets.into_iter().map(|p| (p.id, p)).collect();
    let vets: HashMap<Uuid, UserProfile> = vets.into_iter().map(|v| (v.id, v)).collect();

    records
        .into_iter()
        .map(|appointment| {
            let pet = pets.get(&appointment.pet_id).cloned();
            if pet.is_none() {
                warn!(id = %appointment.id, pet_id = %appointment.pet_id, "appointment references unknown pet");
            }
            let vet = appointment.vet_id.and_then(|vet_id| {
                let vet = vets.get(&vet_id).cloned();
                if vet.is_none() {
                    warn!(id = %appointment.id, %vet_id, "appointment references unknown vet");
                }
                vet
            });
            AppointmentView {
                appointment,
                pet,
                vet,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::{booked, owner, pet, vet};

    #[test]
    fn collects_distinct_references() {
        let owner = owner("Ana");
        let rex = pet("Rex", &owner);
        let vet = vet("Dr. Soto");
        let records = vec![
            booked(&rex, Some(vet.id), "01-01-2099"),
            booked(&rex, None, "02-01-2099"),
        ];
        let (pets, vets) = related_ids(&records);
        assert_eq!(pets, vec![rex.id]);
        assert_eq!(vets, vec![vet.id]);
    }

    #[test]
    fn joins_pet_owner_species_and_vet() {
        let owner = owner("Ana");
        let rex = pet("Rex", &owner);
        let vet = vet("Dr. Soto");
        let records = vec![booked(&rex, Some(vet.id), "01-01-2099")];

        let views = attach(records.clone(), vec![rex.clone()], vec![vet.clone()]);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].appointment, records[0]);
        let attached = views[0].pet.as_ref().unwrap();
        assert_eq!(attached.owner.full_name, "Ana");
        assert_eq!(attached.species.name, "Dog");
        assert_eq!(views[0].vet.as_ref().unwrap().role.role, "Veterinarian");
    }

    #[test]
    fn dangling_references_stay_empty() {
        let owner = owner("Ana");
        let rex = pet("Rex", &owner);
        let records = vec![booked(&rex, Some(Uuid::new_v4()), "01-01-2099")];

        let views = attach(records, vec![], vec![]);
        assert!(views[0].pet.is_none());
        assert!(views[0].vet.is_none());
    }
}
