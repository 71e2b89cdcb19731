#[derive(thiserror::Error, Debug)]
pub enum RefresherError {
	#[error("database error")]
	Database(#[from] sqlx::Error),
}
