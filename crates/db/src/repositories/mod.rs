pub mod area_repo;
pub mod category_repo;
pub mod domain_repo;
pub mod firing_period_repo;
pub mod firing_schedule_repo;
pub mod message_repo;
pub mod setting_repo;

pub use area_repo::AreaRepo;
pub use category_repo::CategoryRepo;
pub use domain_repo::DomainRepo;
pub use firing_period_repo::FiringPeriodRepo;
pub use firing_schedule_repo::FiringScheduleRepo;
pub use message_repo::MessageRepo;
pub use setting_repo::SettingRepo;
