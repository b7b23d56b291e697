//! Demo data generator behind `condoctl --seed`.
//!
//! Everything runs in one transaction. Reference data (accounts, expense types, common
//! areas) is get-or-create so the seeder can be run repeatedly; households are always new.

use crate::{
    api::models::{
        fees::FeeStatus,
        maintenance::{MaintenancePriority, MaintenanceStatus},
        users::Role,
    },
    auth::password,
    db::{
        handlers::{
            CommonAreas, ExpenseTypes, Fees, MaintenanceRequests, Notices, Pets, Repository, Units, Users, Vehicles,
            fees::FeeFilter,
        },
        models::{
            common_areas::CommonAreaCreateDBRequest,
            fees::ExpenseTypeCreateDBRequest,
            households::{PetCreateDBRequest, VehicleCreateDBRequest},
            maintenance::MaintenanceRequestCreateDBRequest,
            notices::NoticeCreateDBRequest,
            units::UnitCreateDBRequest,
            users::UserCreateDBRequest,
        },
    },
    types::{UnitId, UserId},
};
use chrono::NaiveDate;
use rand::prelude::RngExt;
use rand::rng;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use std::collections::HashSet;
use tracing::{info, instrument};

const TOWERS: [char; 3] = ['A', 'B', 'C'];
const FLOORS: u32 = 25;
const DOORS: [char; 4] = ['A', 'B', 'C', 'D'];
const PERIODS: [&str; 3] = ["2025-08", "2025-07", "2025-06"];

const FIRST_NAMES: [&str; 10] = ["Ana", "Carlos", "Lucia", "Mateo", "Sofia", "Diego", "Valentina", "Martin", "Camila", "Pablo"];
const LAST_NAMES: [&str; 10] = ["Gomez", "Fernandez", "Rodriguez", "Lopez", "Martinez", "Perez", "Sanchez", "Romero", "Diaz", "Torres"];
const PLATE_SUFFIXES: [&str; 3] = ["ABC", "XYZ", "KLM"];
const BRANDS: [(&str, &str); 4] = [("Toyota", "Corolla"), ("Nissan", "Sentra"), ("Kia", "Rio"), ("Suzuki", "Swift")];
const COLORS: [&str; 4] = ["White", "Black", "Silver", "Red"];
const PET_NAMES: [&str; 6] = ["Luna", "Max", "Simba", "Coco", "Rocky", "Mia"];

const MAINTENANCE_ISSUES: [(&str, &str); 5] = [
    ("Leaking faucet", "The kitchen faucet drips constantly."),
    ("Broken intercom", "The intercom does not ring inside the unit."),
    ("Hallway light out", "The light in front of the door is off."),
    ("Clogged drain", "The bathroom drain empties very slowly."),
    ("Door lock jammed", "The main door lock is hard to turn."),
];

/// Options of a seeding run
#[derive(Debug, Clone, Copy)]
pub struct SeedOptions {
    /// Wipe demo data before seeding
    pub clean: bool,
    /// Number of resident households to create
    pub families: usize,
}

/// What a seeding run created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub households: usize,
    pub vehicles: usize,
    pub pets: usize,
    pub fees_issued: u64,
    pub fees_paid: usize,
    pub maintenance_requests: usize,
}

#[derive(Debug, Clone)]
struct VehiclePlan {
    plate: String,
    brand: &'static str,
    model: &'static str,
    color: &'static str,
}

#[derive(Debug, Clone)]
struct PetPlan {
    name: &'static str,
    species: &'static str,
}

#[derive(Debug, Clone)]
struct HouseholdPlan {
    full_name: String,
    tower: char,
    floor: u32,
    door: char,
    vehicle: Option<VehiclePlan>,
    pet: Option<PetPlan>,
}

impl HouseholdPlan {
    fn unit_code(&self) -> String {
        unit_code(self.tower, self.floor, self.door)
    }
}

fn unit_code(tower: char, floor: u32, door: char) -> String {
    format!("T{tower}-{floor}-{door}")
}

/// Every unit slot of the building whose code is not taken yet
fn free_slots(taken: &HashSet<String>) -> Vec<(char, u32, char)> {
    let mut slots = Vec::new();
    for tower in TOWERS {
        for floor in 1..=FLOORS {
            for door in DOORS {
                if !taken.contains(&unit_code(tower, floor, door)) {
                    slots.push((tower, floor, door));
                }
            }
        }
    }
    slots
}

/// Draw `families` households on distinct free unit slots. `plates` holds the plates
/// already registered; drawn plates are added to it.
fn plan_households(
    families: usize,
    mut slots: Vec<(char, u32, char)>,
    plates: &mut HashSet<String>,
) -> anyhow::Result<Vec<HouseholdPlan>> {
    if families > slots.len() {
        anyhow::bail!("Cannot seed {families} households: only {} unit codes are free", slots.len());
    }
    let plate_space = 10_000 * PLATE_SUFFIXES.len();
    let vehicle_budget = plate_space.saturating_sub(plates.len());
    if families > vehicle_budget {
        anyhow::bail!("Cannot seed {families} households: only {vehicle_budget} plates are free");
    }

    let mut rng = rng();
    let mut plans = Vec::with_capacity(families);
    for _ in 0..families {
        let (tower, floor, door) = slots.swap_remove(rng.random_range(0..slots.len()));
        let full_name = format!(
            "{} {}",
            FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())],
            LAST_NAMES[rng.random_range(0..LAST_NAMES.len())]
        );

        let vehicle = rng.random_bool(0.8).then(|| {
            let plate = loop {
                let candidate = format!(
                    "{:04} {}",
                    rng.random_range(0..10_000),
                    PLATE_SUFFIXES[rng.random_range(0..PLATE_SUFFIXES.len())]
                );
                if plates.insert(candidate.clone()) {
                    break candidate;
                }
            };
            let (brand, model) = BRANDS[rng.random_range(0..BRANDS.len())];
            VehiclePlan {
                plate,
                brand,
                model,
                color: COLORS[rng.random_range(0..COLORS.len())],
            }
        });

        let pet = rng.random_bool(0.5).then(|| PetPlan {
            name: PET_NAMES[rng.random_range(0..PET_NAMES.len())],
            species: if rng.random_bool(0.5) { "dog" } else { "cat" },
        });

        plans.push(HouseholdPlan {
            full_name,
            tower,
            floor,
            door,
            vehicle,
            pet,
        });
    }
    Ok(plans)
}

/// Delete demo data, children before parents. Admin accounts survive.
#[instrument(skip_all, err)]
async fn clean(conn: &mut PgConnection) -> anyhow::Result<()> {
    for statement in [
        "DELETE FROM maintenance_requests",
        "DELETE FROM notices",
        "DELETE FROM fees",
        "DELETE FROM pets",
        "DELETE FROM vehicles",
        "DELETE FROM family_members",
        "DELETE FROM units",
        "DELETE FROM users u WHERE NOT EXISTS (SELECT 1 FROM profiles p WHERE p.user_id = u.id AND p.role = 'ADMIN')",
        "DELETE FROM expense_types",
        "DELETE FROM common_areas",
    ] {
        let result = sqlx::query(statement).execute(&mut *conn).await?;
        info!("{}: {} rows", statement, result.rows_affected());
    }
    Ok(())
}

async fn get_or_create_account(
    conn: &mut PgConnection,
    username: &str,
    password: &str,
    full_name: &str,
    role: Role,
) -> anyhow::Result<UserId> {
    let mut users = Users::new(conn);
    if let Some(existing) = users.get_user_by_username(username).await? {
        return Ok(existing.id);
    }
    let password_hash = password::hash_password_async(password.to_string()).await?;
    let user = users
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@condo.local"),
            password_hash: Some(password_hash),
            full_name: Some(full_name.to_string()),
            phone: None,
            role,
        })
        .await?;
    Ok(user.id)
}

/// First `residentNNN` username not in use
async fn next_resident_username(users: &mut Users<'_>, start: &mut usize) -> anyhow::Result<String> {
    loop {
        *start += 1;
        let candidate = format!("resident{:03}", *start);
        if users.get_user_by_username(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
}

/// Populate the database with a demo condominium
#[instrument(skip(pool), err)]
pub async fn seed_database(pool: &PgPool, options: SeedOptions) -> anyhow::Result<SeedSummary> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    if options.clean {
        clean(&mut tx).await?;
    }

    let admin_id = get_or_create_account(&mut tx, "admin", "admin123", "Main Administrator", Role::Admin).await?;
    get_or_create_account(&mut tx, "staff", "staff123", "Juan Staff", Role::Staff).await?;

    for (name, amount) in [("Maintenance Fee", Decimal::new(150_000, 2)), ("Reserve Fund", Decimal::new(50_000, 2))] {
        let mut expense_types = ExpenseTypes::new(&mut tx);
        if expense_types.get_by_name(name).await?.is_none() {
            expense_types
                .create(&ExpenseTypeCreateDBRequest {
                    name: name.to_string(),
                    description: None,
                    amount_default: amount,
                })
                .await?;
        }
    }

    for (name, capacity) in [("Pool", 20), ("Gym", 10), ("Event Hall", 50)] {
        let mut areas = CommonAreas::new(&mut tx);
        if areas.get_by_name(name).await?.is_none() {
            areas
                .create(&CommonAreaCreateDBRequest {
                    name: name.to_string(),
                    description: None,
                    capacity,
                    is_active: true,
                })
                .await?;
        }
    }

    let taken: HashSet<String> = sqlx::query_scalar("SELECT code FROM units").fetch_all(&mut *tx).await?.into_iter().collect();
    let mut plates: HashSet<String> =
        sqlx::query_scalar("SELECT plate FROM vehicles").fetch_all(&mut *tx).await?.into_iter().collect();
    let plans = plan_households(options.families, free_slots(&taken), &mut plates)?;

    // One hash shared by every demo resident
    let resident_hash = password::hash_password_async("password123".to_string()).await?;
    let mut residents: Vec<(UserId, UnitId)> = Vec::with_capacity(plans.len());
    let mut username_counter = 0;
    for plan in &plans {
        let mut users = Users::new(&mut tx);
        let username = next_resident_username(&mut users, &mut username_counter).await?;
        let resident = users
            .create(&UserCreateDBRequest {
                email: format!("{username}@condo.local"),
                username,
                password_hash: Some(resident_hash.clone()),
                full_name: Some(plan.full_name.clone()),
                phone: None,
                role: Role::Resident,
            })
            .await?;

        let unit = Units::new(&mut tx)
            .create(&UnitCreateDBRequest {
                code: plan.unit_code(),
                tower: format!("T{}", plan.tower),
                number: format!("{}-{}", plan.floor, plan.door),
                owner_id: Some(resident.id),
            })
            .await?;

        if let Some(vehicle) = &plan.vehicle {
            Vehicles::new(&mut tx)
                .create(&VehicleCreateDBRequest {
                    owner_id: resident.id,
                    plate: vehicle.plate.clone(),
                    brand: vehicle.brand.to_string(),
                    model: vehicle.model.to_string(),
                    color: vehicle.color.to_string(),
                })
                .await?;
            summary.vehicles += 1;
        }
        if let Some(pet) = &plan.pet {
            Pets::new(&mut tx)
                .create(&PetCreateDBRequest {
                    owner_id: resident.id,
                    name: pet.name.to_string(),
                    species: pet.species.to_string(),
                    breed: String::new(),
                })
                .await?;
            summary.pets += 1;
        }
        residents.push((resident.id, unit.id));
    }
    summary.households = residents.len();

    for period in PERIODS {
        let due_date = NaiveDate::parse_from_str(&format!("{period}-10"), "%Y-%m-%d")?;
        let mut fees = Fees::new(&mut tx);
        summary.fees_issued += fees.issue_period(period, None, Some(due_date)).await?.created;

        let issued = fees
            .list(&FeeFilter::new(0, i64::MAX).with_period(period.to_string()).with_status(FeeStatus::Issued))
            .await?;
        let paid: Vec<_> = {
            let mut rng = rng();
            issued.iter().filter(|_| rng.random_bool(0.7)).map(|fee| fee.id).collect()
        };
        for fee_id in &paid {
            fees.mark_paid(*fee_id).await?;
        }
        summary.fees_paid += paid.len();
    }

    for (title, body) in [
        ("Water supply interruption", "Water will be cut on Tuesday from 9:00 to 13:00 for tank cleaning."),
        ("General assembly", "The annual owners' assembly takes place next Saturday at 18:00 in the Event Hall."),
    ] {
        Notices::new(&mut tx)
            .create(&NoticeCreateDBRequest {
                title: title.to_string(),
                body: body.to_string(),
                category_id: None,
                publish_date: None,
                created_by: admin_id,
            })
            .await?;
    }

    if !residents.is_empty() {
        let requests: Vec<_> = {
            let mut rng = rng();
            MAINTENANCE_ISSUES
                .iter()
                .map(|(title, description)| {
                    let (reporter, unit) = residents[rng.random_range(0..residents.len())];
                    let status = if rng.random_bool(0.5) {
                        MaintenanceStatus::Pending
                    } else {
                        MaintenanceStatus::InProgress
                    };
                    let priority = [MaintenancePriority::Low, MaintenancePriority::Medium, MaintenancePriority::High][rng.random_range(0..3)];
                    MaintenanceRequestCreateDBRequest {
                        unit_id: Some(unit),
                        reported_by: reporter,
                        title: title.to_string(),
                        description: description.to_string(),
                        priority,
                        status,
                    }
                })
                .collect()
        };
        for request in &requests {
            MaintenanceRequests::new(&mut tx).create(request).await?;
        }
        summary.maintenance_requests = requests.len();
    }

    tx.commit().await?;
    info!(
        "Seeded {} households ({} vehicles, {} pets), {} fees issued ({} paid), {} maintenance requests",
        summary.households, summary.vehicles, summary.pets, summary.fees_issued, summary.fees_paid, summary.maintenance_requests
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_households_uses_distinct_codes() {
        let plans = plan_households(40, free_slots(&HashSet::new()), &mut HashSet::new()).unwrap();
        let codes: HashSet<_> = plans.iter().map(HouseholdPlan::unit_code).collect();
        assert_eq!(codes.len(), 40);
        for code in &codes {
            let parts: Vec<_> = code.split('-').collect();
            assert!(["TA", "TB", "TC"].contains(&parts[0]));
            let floor: u32 = parts[1].parse().unwrap();
            assert!((1..=25).contains(&floor));
            assert!(["A", "B", "C", "D"].contains(&parts[2]));
        }
        let plates: HashSet<_> = plans.iter().filter_map(|p| p.vehicle.as_ref()).map(|v| v.plate.clone()).collect();
        assert_eq!(plates.len(), plans.iter().filter(|p| p.vehicle.is_some()).count());
    }

    #[test]
    fn test_plan_households_respects_free_slots() {
        let taken: HashSet<String> = free_slots(&HashSet::new()).into_iter().skip(2).map(|(t, f, d)| unit_code(t, f, d)).collect();
        let free = free_slots(&taken);
        assert_eq!(free.len(), 2);
        assert!(plan_households(3, free.clone(), &mut HashSet::new()).is_err());
        assert_eq!(plan_households(2, free, &mut HashSet::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_plan_households_skips_registered_plates() {
        let mut plates: HashSet<String> = (0..10_000)
            .flat_map(|n| ["ABC", "XYZ"].map(|suffix| format!("{n:04} {suffix}")))
            .collect();
        let plans = plan_households(60, free_slots(&HashSet::new()), &mut plates).unwrap();
        for vehicle in plans.iter().filter_map(|p| p.vehicle.as_ref()) {
            assert!(vehicle.plate.ends_with(" KLM"), "{}", vehicle.plate);
        }
        let drawn = plans.iter().filter(|p| p.vehicle.is_some()).count();
        assert_eq!(plates.len(), 20_000 + drawn);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reseed_avoids_plates_already_registered(pool: PgPool) {
        seed_database(&pool, SeedOptions { clean: false, families: 1 }).await.unwrap();
        let admin_id: UserId = sqlx::query_scalar("SELECT id FROM users WHERE username = 'admin'")
            .fetch_one(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO vehicles (owner_id, plate)
             SELECT $1, lpad(n::text, 4, '0') || ' ' || suffix
             FROM generate_series(0, 9999) AS n, unnest(ARRAY['ABC', 'XYZ']) AS suffix
             ON CONFLICT (plate) DO NOTHING",
        )
        .bind(admin_id)
        .execute(&pool)
        .await
        .unwrap();

        let before: HashSet<String> = sqlx::query_scalar("SELECT plate FROM vehicles").fetch_all(&pool).await.unwrap().into_iter().collect();

        let summary = seed_database(&pool, SeedOptions { clean: false, families: 10 }).await.unwrap();
        assert_eq!(summary.households, 10);
        let after: HashSet<String> = sqlx::query_scalar("SELECT plate FROM vehicles").fetch_all(&pool).await.unwrap().into_iter().collect();
        let fresh: Vec<_> = after.difference(&before).collect();
        assert_eq!(fresh.len(), summary.vehicles);
        assert!(fresh.iter().all(|plate| plate.ends_with(" KLM")));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_seed_is_repeatable(pool: PgPool) {
        let first = seed_database(&pool, SeedOptions { clean: false, families: 5 }).await.unwrap();
        assert_eq!(first.households, 5);
        assert_eq!(first.fees_issued, 5 * 2 * 3);
        assert_eq!(first.maintenance_requests, 5);

        // Reference data is reused, households are added
        let second = seed_database(&pool, SeedOptions { clean: false, families: 2 }).await.unwrap();
        assert_eq!(second.households, 2);
        let expense_types: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM expense_types").fetch_one(&pool).await.unwrap();
        assert_eq!(expense_types, 2);
        let areas: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM common_areas").fetch_one(&pool).await.unwrap();
        assert_eq!(areas, 3);
        let units: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM units").fetch_one(&pool).await.unwrap();
        assert_eq!(units, 7);

        let cleaned = seed_database(&pool, SeedOptions { clean: true, families: 1 }).await.unwrap();
        assert_eq!(cleaned.fees_issued, 2 * 3);
        let units: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM units").fetch_one(&pool).await.unwrap();
        assert_eq!(units, 1);
        let residents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE role = 'RESIDENT'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(residents, 1);
        // The staff account is recreated after the wipe
        let staff: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = 'staff'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(staff, 1);
    }
}
