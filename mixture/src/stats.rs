use definitions::{Parameters, VariableData};

pub trait Stats {
    fn stats<W: std::io::Write>(&self, wtr: W) -> std::io::Result<()>;
}

impl Stats for definitions::DataSet {
    fn stats<W: std::io::Write>(&self, mut wtr: W) -> std::io::Result<()> {
        writeln!(&mut wtr, "Input:{}", self.input_file)?;
        writeln!(&mut wtr, "# of Individuals:{}", self.individual_num)?;
        for var in self.variables.iter() {
            writeln!(&mut wtr, "Variable:{}\tModel:{}", var.name, var.model)?;
            match &var.data {
                VariableData::Real(xs) if xs.iter().any(|x| x.is_some()) => {
                    let observed = xs.iter().flatten();
                    let len = observed.clone().count() as f64;
                    let mean = observed.clone().sum::<f64>() / len;
                    let variance = observed.clone().map(|x| (x - mean).powi(2)).sum::<f64>() / len;
                    let min = observed.clone().copied().fold(f64::INFINITY, f64::min);
                    let max = observed.copied().fold(f64::NEG_INFINITY, f64::max);
                    writeln!(&mut wtr, "Mean:{:.3}\nSD:{:.3}", mean, variance.sqrt())?;
                    writeln!(&mut wtr, "Max:{:.3}\nMin:{:.3}", max, min)?;
                    writeln!(&mut wtr, "Missing:{}", var.data.missing_num())?;
                }
                VariableData::Functional(curves) if !curves.is_empty() => {
                    let lens = curves.iter().map(|c| c.len());
                    let sum = lens.clone().sum::<usize>();
                    let min = lens.clone().min().unwrap_or(0);
                    let max = lens.clone().max().unwrap_or(0);
                    writeln!(
                        &mut wtr,
                        "Total Points:{}\nMean Points:{}",
                        sum,
                        sum / curves.len()
                    )?;
                    writeln!(&mut wtr, "Max Points:{}\nMin Points:{}", max, min)?;
                }
                _ => writeln!(&mut wtr, "Empty")?,
            }
        }
        if !self.is_clustered() {
            return Ok(());
        }
        writeln!(&mut wtr, "Clustering")?;
        for (k, prop) in self.proportions.iter().enumerate() {
            let count = self.assignments.iter().filter(|a| a.cluster == k).count();
            writeln!(&mut wtr, "Cluster:{}\tProportion:{:.3}\tCount:{}", k, prop, count)?;
        }
        if let Some(lk) = self.ln_likelihood {
            writeln!(&mut wtr, "LnLikelihood:{:.4}", lk)?;
        }
        if let Some(icl) = self.icl {
            writeln!(&mut wtr, "ICL:{:.4}", icl)?;
        }
        for params in self.parameters.iter() {
            match &params.parameters {
                Parameters::Gaussian { mean, sd } => {
                    for (k, (m, s)) in mean.iter().zip(sd).enumerate() {
                        writeln!(&mut wtr, "{}\t{}\tMean:{:.3}\tSD:{:.3}", params.name, k, m, s)?;
                    }
                }
                Parameters::Gamma { shape, scale } => {
                    for (k, (a, b)) in shape.iter().zip(scale).enumerate() {
                        writeln!(&mut wtr, "{}\t{}\tShape:{:.3}\tScale:{:.3}", params.name, k, a, b)?;
                    }
                }
                Parameters::Functional { classes } => {
                    for (k, class) in classes.iter().enumerate() {
                        for (s, ((alpha, beta), sd)) in class
                            .alpha
                            .iter()
                            .zip(class.beta.iter())
                            .zip(class.sd.iter())
                            .enumerate()
                        {
                            writeln!(
                                &mut wtr,
                                "{}\t{}\t{}\tAlpha:{:.3?}\tBeta:{:.3?}\tSD:{:.3}",
                                params.name, k, s, alpha, beta, sd
                            )?;
                        }
                    }
                }
            }
            if let Some(stats) = params.statistics.as_ref() {
                for (i, name) in stats.names.iter().enumerate() {
                    writeln!(
                        &mut wtr,
                        "{}\t{}\tMedian:{:.3}\tInterval{:.2}:[{:.3},{:.3}]",
                        params.name, name, stats.median[i], stats.level, stats.lower[i], stats.upper[i]
                    )?;
                }
            }
        }
        Ok(())
    }
}
