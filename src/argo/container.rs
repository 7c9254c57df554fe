//! Container and Volume Lowering
//!
//! Builds the container of a template from a DockerRequirement and sizes
//! the shared output volume from a ResourceRequirement.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::model::{
    Container, ObjectMeta, PersistentVolumeClaim, PersistentVolumeClaimSpec, ResourceRequests,
    VolumeMount,
};
use crate::cwl::model::CwlExpression;
use crate::cwl::requirements::DockerRequirement;
use crate::error::EmissionError;

/// Kubernetes resource quantity: a decimal number with an optional
/// binary/decimal suffix or exponent.
static QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+|Ki|Mi|Gi|Ti|Pi|Ei|m|k|M|G|T|P|E)?$")
        .unwrap_or_else(|e| panic!("invalid quantity pattern: {}", e))
});

/// Builds a container from a DockerRequirement.
///
/// Only `dockerPull` is honored. `dockerOutputDirectory` becomes the
/// container's working directory.
///
/// # Arguments
///
/// * `owner` - Tool or step id, used in error messages
/// * `docker` - The requirement, if one was declared
pub fn container_from_docker(
    owner: &str,
    docker: Option<&DockerRequirement>,
) -> Result<Container, EmissionError> {
    let docker = docker.ok_or_else(|| EmissionError::MissingDockerRequirement(owner.to_string()))?;

    if docker.docker_file.is_some() {
        return Err(EmissionError::UnsupportedDockerSource("dockerFile"));
    }
    if docker.docker_image_id.is_some() {
        return Err(EmissionError::UnsupportedDockerSource("dockerImageId"));
    }
    if docker.docker_import.is_some() {
        return Err(EmissionError::UnsupportedDockerSource("dockerImport"));
    }

    let image = docker
        .docker_pull
        .clone()
        .ok_or_else(|| EmissionError::MissingDockerPull(owner.to_string()))?;

    let mut container = Container {
        image,
        ..Container::default()
    };

    if let Some(dir) = &docker.docker_output_directory {
        warn!("Treating dockerOutputDirectory as the container working directory");
        info!("Changing container working directory to {}", dir);
        container.working_dir = Some(dir.clone());
    }

    Ok(container)
}

/// Mounts the named volume at the working directory, or at `default_mount_path`.
pub fn attach_volume(container: &mut Container, volume_name: &str, default_mount_path: &str) {
    let mount_path = container
        .working_dir
        .clone()
        .unwrap_or_else(|| default_mount_path.to_string());

    container.volume_mounts = vec![VolumeMount {
        name: volume_name.to_string(),
        mount_path,
    }];
}

/// Renders a size expression as a Kubernetes quantity.
///
/// Integers and floats are mebibytes (floats rounded up); raw strings must
/// already be valid quantities.
pub fn quantity(expr: &CwlExpression) -> Result<String, EmissionError> {
    match expr {
        CwlExpression::Raw(raw) => {
            let raw = raw.trim();
            if QUANTITY.is_match(raw) {
                Ok(raw.to_string())
            } else {
                Err(EmissionError::InvalidQuantity(raw.to_string()))
            }
        }
        CwlExpression::Int(n) => Ok(format!("{}Mi", n)),
        CwlExpression::Float(f) => Ok(format!("{}Mi", f.ceil() as i64)),
        other => Err(EmissionError::UnsupportedQuantity(other.kind_name())),
    }
}

/// A read-write-many claim requesting `storage` of the given size.
pub fn volume_claim(name: &str, storage: String) -> PersistentVolumeClaim {
    debug!("Requesting {} of storage for volume '{}'", storage, name);

    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), storage);

    PersistentVolumeClaim {
        metadata: ObjectMeta::named(name),
        spec: PersistentVolumeClaimSpec {
            access_modes: vec!["ReadWriteMany".to_string()],
            resources: ResourceRequests { requests },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull(image: &str) -> DockerRequirement {
        DockerRequirement {
            docker_pull: Some(image.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_container_from_pull() {
        let container = container_from_docker("t", Some(&pull("busybox"))).unwrap();
        assert_eq!(container.image, "busybox");
        assert!(container.working_dir.is_none());
    }

    #[test]
    fn test_output_directory_becomes_working_dir() {
        let mut docker = pull("busybox");
        docker.docker_output_directory = Some("/work".into());
        let container = container_from_docker("t", Some(&docker)).unwrap();
        assert_eq!(container.working_dir.as_deref(), Some("/work"));
    }

    #[test]
    fn test_other_sources_unsupported() {
        let mut docker = pull("busybox");
        docker.docker_image_id = Some("sha256:abc".into());
        assert!(matches!(
            container_from_docker("t", Some(&docker)),
            Err(EmissionError::UnsupportedDockerSource("dockerImageId"))
        ));

        let mut docker = pull("busybox");
        docker.docker_import = Some("image.tar".into());
        assert!(matches!(
            container_from_docker("t", Some(&docker)),
            Err(EmissionError::UnsupportedDockerSource("dockerImport"))
        ));

        let mut docker = pull("busybox");
        docker.docker_file = Some(serde_yaml::Value::from("FROM scratch"));
        assert!(matches!(
            container_from_docker("t", Some(&docker)),
            Err(EmissionError::UnsupportedDockerSource("dockerFile"))
        ));
    }

    #[test]
    fn test_missing_docker() {
        assert!(matches!(
            container_from_docker("step-a", None),
            Err(EmissionError::MissingDockerRequirement(ref id)) if id == "step-a"
        ));
        assert!(matches!(
            container_from_docker("step-a", Some(&DockerRequirement::default())),
            Err(EmissionError::MissingDockerPull(_))
        ));
    }

    #[test]
    fn test_attach_volume_mount_path() {
        let mut container = Container::default();
        attach_volume(&mut container, "argovolume", "/mnt/pvol");
        assert_eq!(container.volume_mounts[0].mount_path, "/mnt/pvol");
        assert_eq!(container.volume_mounts[0].name, "argovolume");

        container.working_dir = Some("/work".into());
        attach_volume(&mut container, "argovolume", "/mnt/pvol");
        assert_eq!(container.volume_mounts.len(), 1);
        assert_eq!(container.volume_mounts[0].mount_path, "/work");
    }

    #[test]
    fn test_quantity_conversion() {
        assert_eq!(quantity(&CwlExpression::Int(1024)).unwrap(), "1024Mi");
        assert_eq!(quantity(&CwlExpression::Float(10.2)).unwrap(), "11Mi");
        assert_eq!(quantity(&CwlExpression::Raw("5Gi".into())).unwrap(), "5Gi");
        assert_eq!(quantity(&CwlExpression::Raw("1e3".into())).unwrap(), "1e3");
        assert!(matches!(
            quantity(&CwlExpression::Raw("lots".into())),
            Err(EmissionError::InvalidQuantity(_))
        ));
        assert!(matches!(
            quantity(&CwlExpression::Bool(true)),
            Err(EmissionError::UnsupportedQuantity("boolean"))
        ));
        assert!(matches!(
            quantity(&CwlExpression::Expression("$(runtime.outdirSize)".into())),
            Err(EmissionError::UnsupportedQuantity("expression"))
        ));
    }

    #[test]
    fn test_volume_claim_shape() {
        let claim = volume_claim("argovolume", "100Mi".into());
        let value = serde_json::to_value(&claim).unwrap();
        assert_eq!(value["metadata"]["name"], "argovolume");
        assert_eq!(value["spec"]["accessModes"][0], "ReadWriteMany");
        assert_eq!(value["spec"]["resources"]["requests"]["storage"], "100Mi");
    }
}
