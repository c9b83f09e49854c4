//! [`SensorRegistry`] – the ordered table of sensor categories to scan.
//!
//! Each [`SensorCategory`] pairs a category name with the factory that builds
//! its driver and the telemetry event names that driver emits. The registry
//! is built once at startup and passed explicitly into discovery; the order
//! of registration is the order categories are scanned in.
//!
//! The registry also owns the list of attached [`SensorInstance`]s per
//! category. Descriptors never change after construction; instance lists
//! only grow.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use antws_types::SensorProfile;

use crate::error::{Error, Result};
use crate::sensor::{SensorDriver, SensorInstance};
use crate::transport::SharedTransport;

/// Builds a driver for one category, bound to a transport.
pub type DriverFactory = Arc<dyn Fn(SharedTransport) -> Box<dyn SensorDriver> + Send + Sync>;

/// Immutable description of one sensor category.
#[derive(Clone)]
pub struct SensorCategory {
    name: String,
    factory: DriverFactory,
    event_names: Vec<String>,
}

impl SensorCategory {
    /// Describe a category.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the name is empty, contains `/`,
    /// or the event names are empty or not distinct.
    pub fn new<I, S>(name: impl Into<String>, event_names: I, factory: DriverFactory) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(Error::invalid_config(format!(
                "invalid category name '{name}'"
            )));
        }

        let event_names: Vec<String> = event_names.into_iter().map(Into::into).collect();
        if event_names.is_empty() {
            return Err(Error::invalid_config(format!(
                "category '{name}' declares no telemetry events"
            )));
        }
        let mut seen = HashSet::new();
        for event in &event_names {
            if !seen.insert(event.as_str()) {
                return Err(Error::invalid_config(format!(
                    "category '{name}' declares event '{event}' twice"
                )));
            }
        }

        Ok(Self {
            name,
            factory,
            event_names,
        })
    }

    /// Describe a category from a static ANT+ profile.
    pub fn from_profile(profile: &SensorProfile, factory: DriverFactory) -> Result<Self> {
        Self::new(profile.name, profile.event_names.iter().copied(), factory)
    }

    /// Category name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Telemetry event names in declaration order.
    pub fn event_names(&self) -> &[String] {
        &self.event_names
    }

    /// Build a driver bound to `transport`.
    pub fn create_driver(&self, transport: SharedTransport) -> Box<dyn SensorDriver> {
        (self.factory)(transport)
    }
}

impl fmt::Debug for SensorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorCategory")
            .field("name", &self.name)
            .field("event_names", &self.event_names)
            .finish_non_exhaustive()
    }
}

/// Ordered, read-only set of categories plus the instances attached so far.
#[derive(Default)]
pub struct SensorRegistry {
    categories: Vec<SensorCategory>,
    instances: RwLock<HashMap<String, Vec<Arc<SensorInstance>>>>,
}

impl SensorRegistry {
    /// Start building a registry.
    pub fn builder() -> SensorRegistryBuilder {
        SensorRegistryBuilder::default()
    }

    /// Build a registry from profiles, asking `factory_for` for each driver
    /// factory. Registration order follows `profiles`.
    pub fn from_profiles<F>(profiles: &[SensorProfile], mut factory_for: F) -> Result<Self>
    where
        F: FnMut(&SensorProfile) -> DriverFactory,
    {
        let mut builder = Self::builder();
        for profile in profiles {
            builder = builder.category(SensorCategory::from_profile(profile, factory_for(profile))?);
        }
        builder.build()
    }

    /// Keep only the named categories, preserving registration order.
    ///
    /// An empty `names` keeps everything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a name that is not registered.
    pub fn with_only(self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }
        for name in names {
            if self.get(name).is_none() {
                return Err(Error::invalid_config(format!(
                    "unknown sensor category '{name}'"
                )));
            }
        }
        let categories = self
            .categories
            .into_iter()
            .filter(|c| names.iter().any(|n| n == c.name()))
            .collect();
        Ok(Self {
            categories,
            instances: self.instances,
        })
    }

    /// Categories in registration order.
    pub fn categories(&self) -> &[SensorCategory] {
        &self.categories
    }

    /// Look up a category by name.
    pub fn get(&self, name: &str) -> Option<&SensorCategory> {
        self.categories.iter().find(|c| c.name() == name)
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether no categories are registered.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Record an attached instance under its category.
    pub fn attach(&self, instance: Arc<SensorInstance>) {
        let mut instances = match self.instances.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        instances
            .entry(instance.category().to_string())
            .or_default()
            .push(instance);
    }

    /// Instances attached for a category.
    pub fn instances(&self, name: &str) -> Vec<Arc<SensorInstance>> {
        let instances = match self.instances.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        instances.get(name).cloned().unwrap_or_default()
    }

    /// Names of categories with at least one attached instance, in
    /// registration order.
    pub fn attached_categories(&self) -> Vec<String> {
        let instances = match self.instances.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.categories
            .iter()
            .filter(|c| instances.get(c.name()).is_some_and(|v| !v.is_empty()))
            .map(|c| c.name().to_string())
            .collect()
    }
}

impl fmt::Debug for SensorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorRegistry")
            .field("categories", &self.categories)
            .field("attached", &self.attached_categories())
            .finish()
    }
}

/// Builder for [`SensorRegistry`].
#[derive(Default)]
pub struct SensorRegistryBuilder {
    categories: Vec<SensorCategory>,
}

impl SensorRegistryBuilder {
    /// Append a category. Scan order is append order.
    #[must_use]
    pub fn category(mut self, category: SensorCategory) -> Self {
        self.categories.push(category);
        self
    }

    /// Finish the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when two categories share a name.
    pub fn build(self) -> Result<SensorRegistry> {
        let mut seen = HashSet::new();
        for category in &self.categories {
            if !seen.insert(category.name().to_string()) {
                return Err(Error::invalid_config(format!(
                    "duplicate sensor category '{}'",
                    category.name()
                )));
            }
        }
        Ok(SensorRegistry {
            categories: self.categories,
            instances: RwLock::new(HashMap::new()),
        })
    }
}
