//! Services layer - Business logic
//!
//! Services validate input, apply business rules and coordinate the
//! repositories, the category cache and file storage.

pub mod category;
pub mod content;
pub mod course;
pub mod dashboard;
pub mod document;
pub mod news;
pub mod password;
pub mod storage;
pub mod test;
pub mod token;
pub mod user;
pub mod validation;

pub use category::{generate_slug, CategoryService, CategoryServiceError};
pub use content::{ContentServiceError, FileDownload};
pub use course::{CourseForm, CourseService};
pub use dashboard::{DashboardService, DashboardStats};
pub use document::{DocumentService, DocumentUpdate, DocumentUpload};
pub use news::{NewsForm, NewsService};
pub use password::{hash_password, verify_password};
pub use storage::{Storage, StorageError, UploadedFile};
pub use self::test::{TestPayload, TestService};
pub use user::{
    AdminUserUpdate, AuthSession, LoginInput, RegisterInput, UserPayload, UserService, UserServiceError,
};
pub use validation::ValidationErrors;
