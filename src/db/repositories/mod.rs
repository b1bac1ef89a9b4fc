//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod category;
pub mod course;
pub mod document;
pub mod filter;
pub mod news;
pub mod test;
pub mod token;
pub mod user;

pub use self::category::{CategoryRepository, SqlxCategoryRepository};
pub use self::course::{CourseRepository, CourseTotals, SqlxCourseRepository};
pub use self::document::{DocumentRepository, DocumentTotals, SqlxDocumentRepository};
pub use self::news::{NewsRepository, NewsTotals, SqlxNewsRepository};
pub use self::test::{SqlxTestRepository, TestRepository};
pub use self::token::{SqlxTokenRepository, TokenRepository};
pub use self::user::{SqlxUserRepository, UserRepository};
