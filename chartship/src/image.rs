use std::path::PathBuf;

use log::{debug, info};

use crate::{
    config::ImageDefinition,
    docker::{BuildArgs, ImageBackend},
    error::{Error, Result},
    git::Vcs,
    image_name::ImageName,
};

/// An image definition with its tags resolved for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub name: ImageName,
    pub tag: String,
    /// Tag of the image built from the previous change to the build context, used as build cache.
    pub parent_tag: Option<String>,
    pub context: PathBuf,
}

impl Image {
    /// Without an explicit tag, an image is tagged with the last commit that touched its build
    /// context. The commit before that names the parent image.
    pub fn resolve(definition: &ImageDefinition, vcs: &dyn Vcs) -> Result<Self> {
        let (tag, parent_tag) = match definition.tag.as_deref() {
            Some(tag) => (tag.to_owned(), None),
            None => {
                let mut commits = vcs
                    .last_modified_commits(&definition.context, 2)?
                    .into_iter();
                let tag = commits.next().ok_or_else(|| Error::UnresolvedTag {
                    image: definition.name.to_string(),
                    reason: format!(
                        "no commit touches {context}",
                        context = definition.context.display()
                    ),
                })?;
                (tag, commits.next())
            }
        };

        Ok(Self {
            name: definition.name.clone(),
            tag,
            parent_tag,
            context: definition.context.clone(),
        })
    }

    pub fn reference(&self) -> String {
        self.name.with_tag(&self.tag)
    }

    pub fn parent_reference(&self) -> Option<String> {
        self.parent_tag.as_deref().map(|tag| self.name.with_tag(tag))
    }

    /// Primes the local cache with the parent image. Returns the parent reference when it is
    /// available locally afterwards; a parent missing from the registry is not an error.
    pub fn fetch_parent_image(&self, backend: &dyn ImageBackend) -> Result<Option<String>> {
        let Some(parent) = self.parent_reference() else {
            return Ok(None);
        };

        let wrap = |cause: Error| Error::FetchParentFailed {
            image: parent.clone(),
            cause: Box::new(cause),
        };

        if backend.exists_locally(&parent).map_err(wrap)? {
            debug!("parent image {parent} is already present");
            return Ok(Some(parent));
        }

        if backend.pull(&parent).map_err(wrap)? {
            debug!("pulled parent image {parent}");
            Ok(Some(parent))
        } else {
            debug!("parent image {parent} is not in the registry");
            Ok(None)
        }
    }

    pub fn build(&self, backend: &dyn ImageBackend, cache_from: Option<&str>) -> Result<()> {
        let image = self.reference();
        info!("building {image}");
        backend
            .build(BuildArgs {
                context: &self.context,
                image: &image,
                cache_from,
            })
            .map_err(|cause| Error::BuildFailed {
                image: image.clone(),
                cause: Box::new(cause),
            })
    }

    pub fn push(&self, backend: &dyn ImageBackend) -> Result<()> {
        let image = self.reference();
        info!("pushing {image}");
        backend.push(&image).map_err(|cause| Error::PushFailed {
            image: image.clone(),
            cause: Box::new(cause),
        })
    }
}
