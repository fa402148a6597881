//! # Emissions Categories — Versioned Field Sets
//!
//! The Tech Carbon Standard payload groups emissions into four blocks:
//! upstream, direct, indirect and downstream. Which named entries a block
//! may hold depends on the payload's schema version.
//!
//! ## Design
//!
//! [`CategoryField`] is the single enum of every entry name that has ever
//! existed in any version. [`TcsVersion::fields`] is the closed set for one
//! version, so a block constructed for `0.0.1` cannot represent `software`
//! (introduced in `0.0.2`) at all; construction fails instead.
//!
//! | Block | 0.0.1 | 0.0.2 | 0.1.0 |
//! |-------|-------|-------|-------|
//! | upstream | employee_hardware, network_hardware, server_hardware | + software | + foundation_models |
//! | direct | onsite_employee_hardware, networking, servers, generators | same | onsite_employee_hardware renamed employee_devices |
//! | indirect | offsite_employee_hardware, cloud_services, saas, managed_services | cloud_services renamed cloud | offsite_employee_hardware removed |
//! | downstream | end_user_devices, network_data_transfer | same | + downstream_infrastructure |
//!
//! Direct on-site hardware, networking and servers are Scope-2 sources and
//! may carry an accounting method from `0.1.0` on. Generators burn fuel on
//! site (Scope 1) and never carry a method.
//!
//! Names that no version defines are extension entries: kept verbatim and
//! ignored by completeness and totals.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::emissions::{CategoryEntry, Scope2Emissions};
use crate::error::{ValidationError, ViolationKind};
use crate::path::FieldPath;
use crate::version::TcsVersion;

/// The four emissions blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Embodied emissions of purchased hardware and software.
    #[serde(rename = "upstream_emissions")]
    Upstream,
    /// Emissions from operating owned or controlled technology.
    #[serde(rename = "direct_emissions")]
    Direct,
    /// Emissions from technology operated by third parties.
    #[serde(rename = "indirect_emissions")]
    Indirect,
    /// Emissions caused by customers using the organisation's products.
    #[serde(rename = "downstream_emissions")]
    Downstream,
}

impl Category {
    /// All four blocks in wire order.
    pub const ALL: &'static [Category] = &[
        Self::Upstream,
        Self::Direct,
        Self::Indirect,
        Self::Downstream,
    ];

    /// The member name inside `tech_carbon_standard`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upstream => "upstream_emissions",
            Self::Direct => "direct_emissions",
            Self::Indirect => "indirect_emissions",
            Self::Downstream => "downstream_emissions",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every entry name defined by any Tech Carbon Standard version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryField {
    // upstream
    EmployeeHardware,
    NetworkHardware,
    ServerHardware,
    Software,
    FoundationModels,
    // direct
    OnsiteEmployeeHardware,
    EmployeeDevices,
    Networking,
    Servers,
    Generators,
    // indirect
    OffsiteEmployeeHardware,
    CloudServices,
    Cloud,
    Saas,
    ManagedServices,
    // downstream
    EndUserDevices,
    NetworkDataTransfer,
    DownstreamInfrastructure,
}

impl CategoryField {
    /// Every field across all versions.
    pub const ALL: &'static [CategoryField] = &[
        Self::EmployeeHardware,
        Self::NetworkHardware,
        Self::ServerHardware,
        Self::Software,
        Self::FoundationModels,
        Self::OnsiteEmployeeHardware,
        Self::EmployeeDevices,
        Self::Networking,
        Self::Servers,
        Self::Generators,
        Self::OffsiteEmployeeHardware,
        Self::CloudServices,
        Self::Cloud,
        Self::Saas,
        Self::ManagedServices,
        Self::EndUserDevices,
        Self::NetworkDataTransfer,
        Self::DownstreamInfrastructure,
    ];

    /// The member name inside its block.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmployeeHardware => "employee_hardware",
            Self::NetworkHardware => "network_hardware",
            Self::ServerHardware => "server_hardware",
            Self::Software => "software",
            Self::FoundationModels => "foundation_models",
            Self::OnsiteEmployeeHardware => "onsite_employee_hardware",
            Self::EmployeeDevices => "employee_devices",
            Self::Networking => "networking",
            Self::Servers => "servers",
            Self::Generators => "generators",
            Self::OffsiteEmployeeHardware => "offsite_employee_hardware",
            Self::CloudServices => "cloud_services",
            Self::Cloud => "cloud",
            Self::Saas => "saas",
            Self::ManagedServices => "managed_services",
            Self::EndUserDevices => "end_user_devices",
            Self::NetworkDataTransfer => "network_data_transfer",
            Self::DownstreamInfrastructure => "downstream_infrastructure",
        }
    }

    /// The block this field belongs to.
    pub fn category(&self) -> Category {
        match self {
            Self::EmployeeHardware
            | Self::NetworkHardware
            | Self::ServerHardware
            | Self::Software
            | Self::FoundationModels => Category::Upstream,
            Self::OnsiteEmployeeHardware
            | Self::EmployeeDevices
            | Self::Networking
            | Self::Servers
            | Self::Generators => Category::Direct,
            Self::OffsiteEmployeeHardware
            | Self::CloudServices
            | Self::Cloud
            | Self::Saas
            | Self::ManagedServices => Category::Indirect,
            Self::EndUserDevices | Self::NetworkDataTransfer | Self::DownstreamInfrastructure => {
                Category::Downstream
            }
        }
    }

    /// Whether entries for this field are Scope-2 figures.
    pub fn is_scope2(&self) -> bool {
        matches!(
            self,
            Self::OnsiteEmployeeHardware | Self::EmployeeDevices | Self::Networking | Self::Servers
        )
    }

    /// Look up a field by its member name within `category`.
    pub fn from_name(category: Category, name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.category() == category && f.as_str() == name)
    }
}

impl fmt::Display for CategoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TcsVersion {
    /// The closed set of fields `category` may hold in this version.
    pub fn fields(&self, category: Category) -> &'static [CategoryField] {
        use CategoryField as F;
        match (self, category) {
            (Self::V0_0_1, Category::Upstream) => {
                &[F::EmployeeHardware, F::NetworkHardware, F::ServerHardware]
            }
            (Self::V0_0_2, Category::Upstream) => &[
                F::EmployeeHardware,
                F::NetworkHardware,
                F::ServerHardware,
                F::Software,
            ],
            (Self::V0_1_0, Category::Upstream) => &[
                F::EmployeeHardware,
                F::NetworkHardware,
                F::ServerHardware,
                F::Software,
                F::FoundationModels,
            ],
            (Self::V0_0_1 | Self::V0_0_2, Category::Direct) => &[
                F::OnsiteEmployeeHardware,
                F::Networking,
                F::Servers,
                F::Generators,
            ],
            (Self::V0_1_0, Category::Direct) => {
                &[F::EmployeeDevices, F::Networking, F::Servers, F::Generators]
            }
            (Self::V0_0_1, Category::Indirect) => &[
                F::OffsiteEmployeeHardware,
                F::CloudServices,
                F::Saas,
                F::ManagedServices,
            ],
            (Self::V0_0_2, Category::Indirect) => {
                &[F::OffsiteEmployeeHardware, F::Cloud, F::Saas, F::ManagedServices]
            }
            (Self::V0_1_0, Category::Indirect) => &[F::Cloud, F::Saas, F::ManagedServices],
            (Self::V0_0_1 | Self::V0_0_2, Category::Downstream) => {
                &[F::EndUserDevices, F::NetworkDataTransfer]
            }
            (Self::V0_1_0, Category::Downstream) => &[
                F::EndUserDevices,
                F::NetworkDataTransfer,
                F::DownstreamInfrastructure,
            ],
        }
    }

    /// Whether Scope-2 entries may record an accounting method.
    pub fn supports_accounting_method(&self) -> bool {
        *self >= Self::V0_1_0
    }
}

/// One block of the category payload, validated against a version.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryBlock {
    category: Category,
    version: TcsVersion,
    entries: BTreeMap<CategoryField, CategoryEntry>,
    extensions: BTreeMap<String, Value>,
}

impl CategoryBlock {
    /// Build a block from known entries.
    ///
    /// # Errors
    ///
    /// See [`CategoryBlock::with_extensions`].
    pub fn new(
        category: Category,
        version: TcsVersion,
        entries: impl IntoIterator<Item = (CategoryField, CategoryEntry)>,
    ) -> Result<Self, ValidationError> {
        Self::with_extensions(category, version, entries, BTreeMap::new())
    }

    /// Build a block from known entries plus extension entries.
    ///
    /// Entries for Scope-2 fields are normalised to [`CategoryEntry::Scope2`];
    /// all others to [`CategoryEntry::Standard`]. Error paths are relative to
    /// the block (e.g. `servers.method`).
    ///
    /// # Errors
    ///
    /// - [`ViolationKind::Misplaced`] when a field belongs to another block,
    ///   or a Scope-1/Scope-3 entry carries an accounting method.
    /// - [`ViolationKind::NotInVersion`] when a field, an extension name, or
    ///   an accounting method is defined by the standard but not by `version`.
    pub fn with_extensions(
        category: Category,
        version: TcsVersion,
        entries: impl IntoIterator<Item = (CategoryField, CategoryEntry)>,
        extensions: BTreeMap<String, Value>,
    ) -> Result<Self, ValidationError> {
        let allowed = version.fields(category);
        let mut normalised = BTreeMap::new();

        for (field, entry) in entries {
            let path = FieldPath::of(field.as_str());
            if field.category() != category {
                return Err(ValidationError::new(
                    path,
                    ViolationKind::Misplaced,
                    format!("{field} belongs to {}, not {category}", field.category()),
                ));
            }
            if !allowed.contains(&field) {
                return Err(ValidationError::new(
                    path,
                    ViolationKind::NotInVersion,
                    format!("{field} is not defined in tech carbon standard {version}"),
                ));
            }
            let entry = normalise_entry(field, entry, version, &path)?;
            normalised.insert(field, entry);
        }

        // Only names unknown to every block and version may ride as extensions.
        for name in extensions.keys() {
            let Some(field) = CategoryField::ALL.iter().find(|f| f.as_str() == name) else {
                continue;
            };
            let path = FieldPath::of(name);
            if field.category() != category {
                return Err(ValidationError::new(
                    path,
                    ViolationKind::Misplaced,
                    format!("{field} belongs to {}, not {category}", field.category()),
                ));
            }
            return Err(ValidationError::new(
                path,
                ViolationKind::NotInVersion,
                format!("{field} is not defined in tech carbon standard {version}"),
            ));
        }

        Ok(Self {
            category,
            version,
            entries: normalised,
            extensions,
        })
    }

    /// Which block this is.
    pub fn category(&self) -> Category {
        self.category
    }

    /// The version the block was validated against.
    pub fn version(&self) -> TcsVersion {
        self.version
    }

    /// The entry for `field`, if reported.
    pub fn get(&self, field: CategoryField) -> Option<&CategoryEntry> {
        self.entries.get(&field)
    }

    /// Reported entries in field order.
    pub fn entries(&self) -> impl Iterator<Item = (CategoryField, &CategoryEntry)> {
        self.entries.iter().map(|(f, e)| (*f, e))
    }

    /// Extension entries not defined by any version.
    pub fn extensions(&self) -> &BTreeMap<String, Value> {
        &self.extensions
    }

    /// Number of known fields with a value.
    pub fn present_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of fields the block's version defines.
    pub fn known_count(&self) -> usize {
        self.version.fields(self.category).len()
    }

    /// Sum of known entries in kgCO2e.
    pub fn total(&self) -> f64 {
        self.entries.values().map(CategoryEntry::amount).sum()
    }
}

fn normalise_entry(
    field: CategoryField,
    entry: CategoryEntry,
    version: TcsVersion,
    path: &FieldPath,
) -> Result<CategoryEntry, ValidationError> {
    let method_path = || path.field("method");
    match (field.is_scope2(), entry) {
        (true, CategoryEntry::Standard(e)) => Ok(CategoryEntry::Scope2(Scope2Emissions::new(e, None))),
        (true, CategoryEntry::Scope2(s)) => {
            if s.method().is_some() && !version.supports_accounting_method() {
                return Err(ValidationError::new(
                    method_path(),
                    ViolationKind::NotInVersion,
                    format!("accounting method is not defined in tech carbon standard {version}"),
                ));
            }
            Ok(CategoryEntry::Scope2(s))
        }
        (false, CategoryEntry::Standard(e)) => Ok(CategoryEntry::Standard(e)),
        (false, CategoryEntry::Scope2(s)) => {
            if s.method().is_some() {
                return Err(ValidationError::new(
                    method_path(),
                    ViolationKind::Misplaced,
                    format!("{field} is not a Scope-2 source and carries no accounting method"),
                ));
            }
            Ok(CategoryEntry::Standard(s.emissions().clone()))
        }
    }
}

impl Serialize for CategoryBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len() + self.extensions.len()))?;
        for (field, entry) in &self.entries {
            map.serialize_entry(field.as_str(), entry)?;
        }
        for (name, value) in &self.extensions {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The `tech_carbon_standard` payload of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechCarbonStandard {
    schema_version: TcsVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_emissions: Option<CategoryBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    direct_emissions: Option<CategoryBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    indirect_emissions: Option<CategoryBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    downstream_emissions: Option<CategoryBlock>,
}

impl TechCarbonStandard {
    /// Assemble a payload from blocks built for `version`.
    ///
    /// # Errors
    ///
    /// [`ViolationKind::NotInVersion`] if a block was built for another
    /// version; [`ViolationKind::Malformed`] if a category appears twice.
    pub fn new(
        version: TcsVersion,
        blocks: impl IntoIterator<Item = CategoryBlock>,
    ) -> Result<Self, ValidationError> {
        let mut payload = Self {
            schema_version: version,
            upstream_emissions: None,
            direct_emissions: None,
            indirect_emissions: None,
            downstream_emissions: None,
        };
        for block in blocks {
            let path = FieldPath::of(block.category.as_str());
            if block.version != version {
                return Err(ValidationError::new(
                    path,
                    ViolationKind::NotInVersion,
                    format!(
                        "block was validated against tech carbon standard {}, payload declares {version}",
                        block.version
                    ),
                ));
            }
            let slot = payload.slot_mut(block.category);
            if slot.is_some() {
                return Err(ValidationError::new(
                    path,
                    ViolationKind::Malformed,
                    "category block supplied more than once",
                ));
            }
            *slot = Some(block);
        }
        Ok(payload)
    }

    /// An empty payload for `version`.
    pub fn empty(version: TcsVersion) -> Self {
        Self {
            schema_version: version,
            upstream_emissions: None,
            direct_emissions: None,
            indirect_emissions: None,
            downstream_emissions: None,
        }
    }

    fn slot_mut(&mut self, category: Category) -> &mut Option<CategoryBlock> {
        match category {
            Category::Upstream => &mut self.upstream_emissions,
            Category::Direct => &mut self.direct_emissions,
            Category::Indirect => &mut self.indirect_emissions,
            Category::Downstream => &mut self.downstream_emissions,
        }
    }

    /// The payload schema version.
    pub fn version(&self) -> TcsVersion {
        self.schema_version
    }

    /// The block for `category`, if present.
    pub fn block(&self, category: Category) -> Option<&CategoryBlock> {
        match category {
            Category::Upstream => self.upstream_emissions.as_ref(),
            Category::Direct => self.direct_emissions.as_ref(),
            Category::Indirect => self.indirect_emissions.as_ref(),
            Category::Downstream => self.downstream_emissions.as_ref(),
        }
    }

    /// Present blocks in wire order.
    pub fn blocks(&self) -> impl Iterator<Item = &CategoryBlock> {
        Category::ALL.iter().filter_map(|c| self.block(*c))
    }
}
