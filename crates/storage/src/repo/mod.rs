mod comments;
mod reactions;
