//! NetCDF metadata inspection
//!
//! Collects the dimension table and variable list of an input file so a run can
//! report what it is about to convert before any slice is read.

use netcdf::File;

/// Information about a dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionInfo {
    pub name: String,
    pub length: usize,
    pub is_unlimited: bool,
}

/// Name and dimension names of a variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableInfo {
    pub name: String,
    pub dimensions: Vec<String>,
}

/// Structural overview of a NetCDF file
#[derive(Debug, Clone, Default)]
pub struct DatasetSummary {
    pub dimensions: Vec<DimensionInfo>,
    pub variables: Vec<VariableInfo>,
}

impl DatasetSummary {
    /// Collect dimensions and variables, each sorted alphabetically.
    pub fn describe(file: &File) -> Self {
        let mut dimensions: Vec<DimensionInfo> = file
            .dimensions()
            .map(|d| DimensionInfo {
                name: d.name().to_string(),
                length: d.len(),
                is_unlimited: d.is_unlimited(),
            })
            .collect();
        dimensions.sort_by(|a, b| a.name.cmp(&b.name));

        let mut variables: Vec<VariableInfo> = file
            .variables()
            .map(|v| VariableInfo {
                name: v.name().to_string(),
                dimensions: v.dimensions().iter().map(|d| d.name().to_string()).collect(),
            })
            .collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            dimensions,
            variables,
        }
    }

    /// Prints dimensions and variables in a compact listing.
    pub fn print(&self) {
        println!("\n Dimensions");
        println!("==============");
        if self.dimensions.is_empty() {
            println!("   (No dimensions found)");
        }
        for dim in &self.dimensions {
            if dim.is_unlimited {
                println!("    {} = {} (unlimited)", dim.name, dim.length);
            } else {
                println!("    {} = {}", dim.name, dim.length);
            }
        }

        println!("\n Variables");
        println!("=============");
        if self.variables.is_empty() {
            println!("   (No variables found)");
        }
        for var in &self.variables {
            if var.dimensions.is_empty() {
                println!("    {}: scalar", var.name);
            } else {
                println!("    {}: [{}]", var.name, var.dimensions.join(", "));
            }
        }
        println!();
    }
}
